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

//! Working set of phrases for a single crawl run.

use anyhow::Result;
use tracing::debug;

use crate::model::Keyword;
use crate::store::ResultStore;

/// Keywords loaded for one run, drained by random sampling without replacement.
pub struct KeywordPool {
    keywords: Vec<Keyword>,
    rng: fastrand::Rng,
}

impl KeywordPool {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            keywords: Vec::new(),
            rng,
        }
    }

    /// Replaces the pool with up to `limit` matching keywords and returns how
    /// many were loaded. An empty result is not an error here.
    pub fn load(
        &mut self,
        store: &dyn ResultStore,
        category: &str,
        language: &str,
        limit: usize,
    ) -> Result<usize> {
        self.keywords = store.keywords(category, language, Some(limit))?;
        debug!(
            category,
            language,
            limit,
            loaded = self.keywords.len(),
            "loaded keyword pool"
        );
        Ok(self.keywords.len())
    }

    pub fn sample(&mut self) -> Option<Keyword> {
        if self.keywords.is_empty() {
            return None;
        }
        let idx = self.rng.usize(..self.keywords.len());
        Some(self.keywords.swap_remove(idx))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl Default for KeywordPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::ANY;
    use crate::store::Store;

    fn store_with(n: usize) -> Result<Store> {
        let store = Store::open_in_memory()?;
        for i in 0..n {
            store.add_keyword(&format!("phrase {i}"), "shop", "de")?;
        }
        Ok(store)
    }

    #[test]
    fn load_returns_min_of_limit_and_rows() -> Result<()> {
        let store = store_with(4)?;
        let mut pool = KeywordPool::with_rng(fastrand::Rng::with_seed(7));
        assert_eq!(pool.load(&store, ANY, ANY, 2)?, 2);
        assert_eq!(pool.load(&store, ANY, ANY, 10)?, 4);
        assert_eq!(pool.load(&store, "brand", ANY, 10)?, 0);
        assert!(pool.is_empty());
        Ok(())
    }

    #[test]
    fn sampling_is_exhaustive_and_non_repeating() -> Result<()> {
        let store = store_with(6)?;
        let mut pool = KeywordPool::with_rng(fastrand::Rng::with_seed(42));
        pool.load(&store, ANY, ANY, 6)?;

        let mut seen = BTreeSet::new();
        for _ in 0..6 {
            let keyword = pool.sample().expect("keyword");
            assert!(seen.insert(keyword.id), "keyword {} repeated", keyword.id);
        }
        assert_eq!(seen.len(), 6);
        assert!(pool.sample().is_none());
        Ok(())
    }

    #[test]
    fn empty_pool_samples_nothing() {
        let mut pool = KeywordPool::new();
        assert_eq!(pool.len(), 0);
        assert!(pool.sample().is_none());
    }
}
