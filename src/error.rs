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

//! Error taxonomy shared by the crawl engine and the CLI.

use serde::Serialize;
use thiserror::Error;

/// Fatal problems with how a run was configured or invoked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no keywords available for the requested category/language")]
    NoKeywords,

    #[error("unsupported search provider '{0}'")]
    UnsupportedProvider(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },

    #[error("missing credential `{0}` in configuration")]
    MissingCredential(&'static str),
}

/// Classified failure of a single provider request.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderFailure {
    #[error("API limit reached (HTTP 429)")]
    RateLimited,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected API response status {0}")]
    UnexpectedStatus(u16),
}

impl ProviderFailure {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
