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

mod aggregate;
mod cli;
mod config;
mod crawler;
mod error;
mod keywords;
mod model;
mod output;
mod provider;
mod runner;
mod store;

use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::CrawlArgs;
use crate::cli::KeywordCommands;
use crate::cli::StoreArgs;
use crate::config::ConfigCtx;
use crate::config::RateLimitPolicy;
use crate::error::ConfigError;
use crate::keywords::KeywordPool;
use crate::model::ANY;
use crate::model::AggregationOutcome;
use crate::output::AggregationOut;
use crate::output::JsonResponse;
use crate::output::print_json;
use crate::provider::ProviderRegistry;
use crate::runner::RunOptions;
use crate::store::ResultStore;
use crate::store::Store;
use crate::store::StoreMode;

fn main() {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // help and version go to stdout and are not failures
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            std::process::exit(code);
        }
    };
    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("phrasefinder=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Returns `Ok(false)` when the command ran but the outcome warrants a
/// non-zero exit status.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Init { path } => cmd_init(path).map(|()| true),
        Commands::Keyword(KeywordCommands::Add(args)) => {
            cmd_keyword_add(&args.phrase, &args.category, &args.language).map(|()| true)
        }
        Commands::Keyword(KeywordCommands::List { json }) => {
            handle_result(cmd_keyword_list(json).map(|()| true), json)
        }
        Commands::Crawl(args) => {
            let json = args.json;
            handle_result(cmd_crawl(args), json)
        }
        Commands::Store(args) => {
            let json = args.json;
            handle_result(cmd_store(args), json)
        }
        Commands::Results { json } => handle_result(cmd_results(json).map(|()| true), json),
        Commands::Findings { json } => handle_result(cmd_findings(json).map(|()| true), json),
        Commands::Stats { json } => handle_result(cmd_stats(json).map(|()| true), json),
    }
}

fn handle_result(result: Result<bool>, json: bool) -> Result<bool> {
    match result {
        Ok(ok) => Ok(ok),
        Err(err) if json => {
            let resp = match err.downcast_ref::<ConfigError>() {
                Some(ConfigError::NoKeywords) => JsonResponse::error("config", &err.to_string())
                    .with_hint("add phrases with `phrasefinder keyword add`"),
                Some(ConfigError::UnsupportedProvider(_)) => {
                    let names = ProviderRegistry::builtin().names().join(", ");
                    JsonResponse::error("config", &err.to_string())
                        .with_hint(&format!("supported providers: {names}"))
                }
                Some(_) => JsonResponse::error("config", &err.to_string()),
                None => JsonResponse::error("error", &format!("{err:#}")),
            };
            print_json(&resp)?;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let config = config::load_global_config()?;
    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    Store::init(&store_path)?;

    println!("Initialized PhraseFinder store at {}", store_path.display());
    Ok(())
}

fn cmd_keyword_add(phrase: &str, category: &str, language: &str) -> Result<()> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        anyhow::bail!("phrase must not be empty");
    }
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite)?;
    let id = store.add_keyword(phrase, category, language)?;
    println!("Added keyword {id}: '{phrase}'");
    Ok(())
}

fn cmd_keyword_list(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let keywords = store.keywords(ANY, ANY, None)?;

    if json {
        print_json(&JsonResponse::ok().with_keywords(keywords))?;
    } else {
        for keyword in keywords {
            println!(
                "{}\t{}\t{}\t{}",
                keyword.id, keyword.category, keyword.language, keyword.phrase
            );
        }
    }
    Ok(())
}

fn cmd_crawl(args: CrawlArgs) -> Result<bool> {
    let registry = ProviderRegistry::builtin();
    let provider_name = registry.resolve(&args.provider)?;
    let ctx = ConfigCtx::load_from_cwd()?;
    let provider = registry.create(provider_name, &ctx.config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite)?;

    let opts = RunOptions {
        keyword_count: args.keyword_count,
        pages_per_keyword: args.pages_per_keyword,
        category: args.category.unwrap_or_else(|| ctx.config.category.clone()),
        language: args.language.unwrap_or_else(|| ctx.config.language.clone()),
        rate_limit_policy: if args.continue_on_rate_limit {
            RateLimitPolicy::Continue
        } else {
            ctx.config.rate_limit_policy
        },
    };
    let mut pool = KeywordPool::new();
    let report = runner::run(&store, provider.as_ref(), &mut pool, &opts)?;
    let rate_limited = report.rate_limited;

    if args.json {
        print_json(&JsonResponse::for_crawl(report))?;
    } else {
        for outcome in &report.outcomes {
            println!(
                "For the keyword '{}', {} results were found and stored.",
                outcome.phrase, outcome.stored
            );
            if let Some(failure) = outcome.failure() {
                eprintln!("warning: crawl of '{}' stopped: {failure}", outcome.phrase);
            }
        }
        println!(
            "Stored {} results for {} of {} requested keywords.",
            report.stored(),
            report.outcomes.len(),
            report.requested
        );
        if rate_limited {
            eprintln!("error: API limit reached; remaining keywords were not crawled");
        }
    }

    Ok(!rate_limited)
}

fn cmd_store(args: StoreArgs) -> Result<bool> {
    let registry = ProviderRegistry::builtin();
    let provider = if args.provider.trim().eq_ignore_ascii_case(ANY) {
        None
    } else {
        Some(registry.resolve(&args.provider)?)
    };
    let start = aggregate::parse_day(&args.start_date)?;
    let end = aggregate::parse_day(&args.end_date)?;
    if start > end {
        return Err(ConfigError::InvertedRange {
            start: args.start_date,
            end: args.end_date,
        }
        .into());
    }

    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite)?;
    let outcome = aggregate::aggregate(&store, start, end, provider)?;
    let ok = !matches!(outcome, AggregationOutcome::PartialFailure { .. });

    if args.json {
        let resp = JsonResponse::ok().with_aggregation(AggregationOut {
            start: args.start_date,
            end: args.end_date,
            provider: provider.map(str::to_string),
            outcome,
        });
        print_json(&resp)?;
    } else {
        match outcome {
            AggregationOutcome::Success { count } => {
                println!("{count} new findings were successfully inserted into the database.")
            }
            AggregationOutcome::NoNewEntriesInWindow => {
                println!("There were no findings within the specified time period.")
            }
            AggregationOutcome::PartialFailure {
                attempted,
                succeeded,
            } => eprintln!(
                "error: only {succeeded} of {attempted} new findings could be inserted into the database"
            ),
        }
    }

    Ok(ok)
}

fn cmd_stats(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let stats = store.stats()?;

    if json {
        print_json(&JsonResponse::ok().with_stats(stats))?;
    } else {
        println!("Keywords: {}", stats.keyword_count);
        println!("Results: {}", stats.result_count);
        println!("Findings: {}", stats.finding_count);
    }
    Ok(())
}

fn cmd_results(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let results = store.results()?;

    if json {
        print_json(&JsonResponse::ok().with_results(results))?;
    } else {
        for item in results {
            println!(
                "{}\t{}\t{}\t{}\t{}",
                item.updated.as_deref().unwrap_or(&item.inserted),
                item.provider,
                item.domain,
                item.url,
                item.phrase
            );
        }
    }
    Ok(())
}

fn cmd_findings(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let findings = store.findings()?;

    if json {
        print_json(&JsonResponse::ok().with_findings(findings))?;
    } else {
        for finding in findings {
            println!(
                "{}\t{}\t{}",
                finding.inserted, finding.keyword_id, finding.domain
            );
        }
    }
    Ok(())
}
