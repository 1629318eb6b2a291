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

//! Shared domain types used by the crawl engine, the store, and the aggregator.

use serde::Serialize;

use crate::error::ProviderFailure;

/// Sentinel for "match anything" in category/language filters.
pub const ANY: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyword {
    pub id: i64,
    pub phrase: String,
    pub category: String,
    pub language: String,
}

/// One entry of a provider result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageItem {
    pub domain: String,
    pub url: String,
    pub title: String,
}

/// A persisted search-result row.
#[derive(Debug, Clone, Serialize)]
pub struct ResultItem {
    pub domain: String,
    pub url: String,
    pub phrase: String,
    pub keyword_id: i64,
    pub title: String,
    pub provider: String,
    pub inserted: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub domain: String,
    pub keyword_id: i64,
    pub inserted: String,
    pub updated: Option<String>,
}

/// A domain eligible for promotion into the findings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub domain: String,
    pub keyword_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Termination {
    /// The provider signalled that no further page exists.
    Exhausted,
    /// The caller's page budget ran out first.
    PageLimit,
    Failed(ProviderFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlOutcome {
    pub phrase: String,
    pub keyword_id: i64,
    pub pages: usize,
    pub stored: usize,
    pub write_failures: usize,
    pub termination: Termination,
}

impl CrawlOutcome {
    pub fn failure(&self) -> Option<&ProviderFailure> {
        match &self.termination {
            Termination::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregationOutcome {
    Success { count: usize },
    NoNewEntriesInWindow,
    PartialFailure { attempted: usize, succeeded: usize },
}
