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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::builder::RangedU64ValueParser;

#[derive(Parser, Debug)]
#[command(
    name = "phrasefinder",
    version,
    about = "Monitor search engines for phrases used by fraudulent shop clusters"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new PhraseFinder store
    Init {
        /// Path to the store directory
        path: Option<PathBuf>,
    },

    /// Manage monitored phrases
    #[command(subcommand)]
    Keyword(KeywordCommands),

    /// Query the search provider for a batch of phrases and store every result
    Crawl(CrawlArgs),

    /// Promote domains first seen in a date window into the findings table
    Store(StoreArgs),

    /// List stored search results
    Results {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List promoted findings
    Findings {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeywordCommands {
    /// Add a phrase to monitor
    Add(KeywordAddArgs),

    /// List monitored phrases
    List {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct KeywordAddArgs {
    /// Phrase text, used verbatim as the search query
    pub phrase: String,

    /// Category label
    #[arg(long, default_value = "any")]
    pub category: String,

    /// Language label
    #[arg(long, default_value = "any")]
    pub language: String,
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Number of phrases to sample
    #[arg(value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub keyword_count: usize,

    /// Result pages to fetch per phrase
    #[arg(value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub pages_per_keyword: usize,

    /// Search provider name (e.g. google)
    pub provider: String,

    /// Only crawl phrases of this category (defaults to the configured one)
    #[arg(long)]
    pub category: Option<String>,

    /// Only crawl phrases of this language (defaults to the configured one)
    #[arg(long)]
    pub language: Option<String>,

    /// Keep crawling the remaining phrases after the API quota is exhausted
    #[arg(long)]
    pub continue_on_rate_limit: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// First day of the window (YYYY-MM-DD, inclusive)
    pub start_date: String,

    /// Last day of the window (YYYY-MM-DD, inclusive)
    pub end_date: String,

    /// Only consider results from this provider; `any` for all providers
    pub provider: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
