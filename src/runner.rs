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

//! Crawl run controller: samples keywords and crawls each in turn.

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::config::RateLimitPolicy;
use crate::crawler::Crawler;
use crate::error::ConfigError;
use crate::keywords::KeywordPool;
use crate::model::CrawlOutcome;
use crate::provider::SearchProvider;
use crate::store::ResultStore;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub keyword_count: usize,
    pub pages_per_keyword: usize,
    pub category: String,
    pub language: String,
    pub rate_limit_policy: RateLimitPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub requested: usize,
    pub available: usize,
    pub outcomes: Vec<CrawlOutcome>,
    /// Set when the batch stopped early because the provider quota was exhausted.
    pub rate_limited: bool,
}

impl RunReport {
    pub fn stored(&self) -> usize {
        self.outcomes.iter().map(|o| o.stored).sum()
    }
}

/// Runs one crawl batch. Outcomes are in sampling order.
///
/// Fails only when no keyword matches; provider failures stay inside the
/// per-keyword outcomes.
pub fn run(
    store: &dyn ResultStore,
    provider: &dyn SearchProvider,
    pool: &mut KeywordPool,
    opts: &RunOptions,
) -> Result<RunReport> {
    let available = pool.load(store, &opts.category, &opts.language, opts.keyword_count)?;
    if pool.is_empty() {
        return Err(ConfigError::NoKeywords.into());
    }
    if available < opts.keyword_count {
        info!(
            requested = opts.keyword_count,
            available, "fewer keywords available than requested"
        );
    }

    let crawler = Crawler::new(provider, store);
    let mut report = RunReport {
        requested: opts.keyword_count,
        available,
        outcomes: Vec::with_capacity(available),
        rate_limited: false,
    };

    while let Some(keyword) = pool.sample() {
        let outcome = crawler.crawl(&keyword, opts.pages_per_keyword);
        info!(
            phrase = %outcome.phrase,
            pages = outcome.pages,
            stored = outcome.stored,
            "keyword crawled"
        );
        let rate_limited = outcome.failure().is_some_and(|f| f.is_rate_limited());
        report.outcomes.push(outcome);

        if rate_limited {
            report.rate_limited = true;
            if opts.rate_limit_policy == RateLimitPolicy::Abort {
                warn!(
                    remaining = pool.len(),
                    "provider quota exhausted, stopping the run"
                );
                break;
            }
        }
    }

    Ok(report)
}
