// Copyright 2026 PhraseFinder Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::model::ANY;

pub const CONFIG_FILE: &str = "phrasefinder.toml";
const API_KEY_ENV: &str = "PHRASEFINDER_GOOGLE_API_KEY";
const ENGINE_ID_ENV: &str = "PHRASEFINDER_GOOGLE_ENGINE_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub category: String,
    pub language: String,
    pub rate_limit_policy: RateLimitPolicy,
    pub google: GoogleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("phrasefinder.db"),
            category: ANY.to_string(),
            language: ANY.to_string(),
            rate_limit_policy: RateLimitPolicy::Abort,
            google: GoogleConfig::default(),
        }
    }
}

/// What the run controller does after a keyword hits the provider's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitPolicy {
    /// Stop the batch; later keywords would hit the same quota.
    Abort,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: String,
    pub engine_id: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::load_from(&cwd)
    }

    pub fn load_from(start: &Path) -> Result<Self> {
        let config = load_global_config()?;
        let root = find_store_root(start, &config.store_path)
            .ok_or_else(|| anyhow::anyhow!("store not found; run `phrasefinder init` first"))?;
        Ok(Self { root, config })
    }

    pub fn store_path(&self) -> PathBuf {
        if self.config.store_path.is_absolute() {
            self.config.store_path.clone()
        } else {
            self.root.join(&self.config.store_path)
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Some(PathBuf::from(appdata));
        }
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Some(PathBuf::from(profile).join("AppData").join("Roaming"));
        }
        return None;
    }

    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support"),
        );
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config"))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("phrasefinder").join(CONFIG_FILE))
}

/// Global config file (or defaults) with credential overrides from the environment.
pub fn load_global_config() -> Result<Config> {
    let mut config = match global_config_path() {
        Some(path) if path.exists() => read_config(&path)?,
        _ => Config::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
        config.google.api_key = key;
    }
    if let Some(id) = lookup(ENGINE_ID_ENV).filter(|v| !v.is_empty()) {
        config.google.engine_id = id;
    }
}

pub fn find_store_root(start: &Path, store_path: &Path) -> Option<PathBuf> {
    if store_path.is_absolute() {
        return store_path
            .exists()
            .then(|| store_path.parent().unwrap_or(store_path).to_path_buf());
    }

    let mut cur = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    loop {
        let candidate = cur.join(store_path);
        if candidate.exists() {
            return Some(cur);
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => return None,
        }
    }
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut config: Config = toml::from_str(&text).with_context(|| format!("parse {CONFIG_FILE}"))?;
    if config.google.timeout_secs == 0 {
        config.google.timeout_secs = GoogleConfig::default().timeout_secs;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn find_store_root_walks_up() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("repo");
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(root.join("phrasefinder.db"), "stub").expect("write db");

        let found = find_store_root(&nested, Path::new("phrasefinder.db"));
        let expected = root.canonicalize().unwrap_or(root);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn read_config_fills_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "rate_limit_policy = \"continue\"\n\n[google]\napi_key = \"k\"\nengine_id = \"cx\"\ntimeout_secs = 0\n",
        )
        .expect("write config");

        let config = read_config(&path).expect("config");
        assert_eq!(config.rate_limit_policy, RateLimitPolicy::Continue);
        assert_eq!(config.category, "any");
        assert_eq!(config.google.api_key, "k");
        assert_eq!(config.google.timeout_secs, 10);
        assert_eq!(
            config.google.endpoint,
            "https://www.googleapis.com/customsearch/v1"
        );
    }

    #[test]
    fn env_overrides_credentials() {
        let mut config = Config::default();
        config.google.engine_id = "from-file".to_string();
        apply_env(&mut config, |key| match key {
            API_KEY_ENV => Some("secret".to_string()),
            ENGINE_ID_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.google.api_key, "secret");
        assert_eq!(config.google.engine_id, "from-file");
    }

    #[test]
    fn rejects_unknown_policy() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "rate_limit_policy = \"retry\"\n").expect("write config");
        assert!(read_config(&path).is_err());
    }
}
