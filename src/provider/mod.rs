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

//! Search providers and the name registry used to pick one at run start.

pub mod google;

use anyhow::Result;

use crate::config::Config;
use crate::error::ConfigError;
use crate::error::ProviderFailure;
use crate::model::PageItem;

/// One page of results in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub has_next: bool,
}

pub type ProviderResult = std::result::Result<Page, ProviderFailure>;

pub trait SearchProvider {
    /// Name recorded with every stored result row.
    fn name(&self) -> &str;

    /// Maximum number of items on one page.
    fn page_size(&self) -> usize;

    /// Fetches the page whose first result has the 1-based index `offset`.
    fn query(&self, phrase: &str, offset: usize) -> ProviderResult;
}

type Factory = fn(&Config) -> Result<Box<dyn SearchProvider>>;

pub struct ProviderRegistry {
    entries: Vec<(&'static str, Factory)>,
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self {
            entries: vec![(google::NAME, google::factory as Factory)],
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// Canonical registered name for `name`, compared case-insensitively.
    pub fn resolve(&self, name: &str) -> std::result::Result<&'static str, ConfigError> {
        let wanted = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(registered, _)| *registered == wanted)
            .map(|(registered, _)| *registered)
            .ok_or_else(|| ConfigError::UnsupportedProvider(name.to_string()))
    }

    pub fn create(&self, name: &str, config: &Config) -> Result<Box<dyn SearchProvider>> {
        let resolved = self.resolve(name)?;
        let factory = self
            .entries
            .iter()
            .find(|(registered, _)| *registered == resolved)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| ConfigError::UnsupportedProvider(name.to_string()))?;
        factory(config)
    }
}
