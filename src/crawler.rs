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

//! Paginated crawl of a single keyword.

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::model::CrawlOutcome;
use crate::model::Keyword;
use crate::model::Termination;
use crate::provider::SearchProvider;
use crate::store::ResultStore;

pub struct Crawler<'a> {
    provider: &'a dyn SearchProvider,
    store: &'a dyn ResultStore,
}

impl<'a> Crawler<'a> {
    pub fn new(provider: &'a dyn SearchProvider, store: &'a dyn ResultStore) -> Self {
        Self { provider, store }
    }

    /// Walks up to `max_pages` result pages for `keyword`, storing every item.
    ///
    /// Provider failures end this keyword's crawl and are reported in the
    /// outcome. Item write failures are logged and left out of `stored`.
    pub fn crawl(&self, keyword: &Keyword, max_pages: usize) -> CrawlOutcome {
        let page_size = self.provider.page_size();
        let mut outcome = CrawlOutcome {
            phrase: keyword.phrase.clone(),
            keyword_id: keyword.id,
            pages: 0,
            stored: 0,
            write_failures: 0,
            termination: Termination::PageLimit,
        };

        for page_index in 0..max_pages {
            let offset = 1 + page_size * page_index;
            let page = match self.provider.query(&keyword.phrase, offset) {
                Ok(page) => page,
                Err(failure) => {
                    warn!(phrase = %keyword.phrase, offset, %failure, "provider request failed");
                    outcome.termination = Termination::Failed(failure);
                    return outcome;
                }
            };
            outcome.pages += 1;
            debug!(
                phrase = %keyword.phrase,
                offset,
                items = page.items.len(),
                has_next = page.has_next,
                "fetched result page"
            );

            for item in &page.items {
                match self.store.store_item(
                    &item.domain,
                    &item.url,
                    &keyword.phrase,
                    keyword.id,
                    &item.title,
                    self.provider.name(),
                ) {
                    Ok(rows) if rows > 0 => outcome.stored += 1,
                    Ok(_) => {
                        warn!(url = %item.url, "result write affected no rows");
                        outcome.write_failures += 1;
                    }
                    Err(err) => {
                        warn!(
                            url = %item.url,
                            error = %format!("{err:#}"),
                            "failed to store result"
                        );
                        outcome.write_failures += 1;
                    }
                }
            }

            if !page.has_next {
                info!(phrase = %keyword.phrase, pages = outcome.pages, "maximum of pages reached");
                outcome.termination = Termination::Exhausted;
                return outcome;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;

    use anyhow::Result;
    use time::Date;

    use super::*;
    use crate::error::ProviderFailure;
    use crate::model::Candidate;
    use crate::provider::testing::ScriptedProvider;
    use crate::provider::testing::page;
    use crate::store::Store;

    fn keyword(phrase: &str) -> Keyword {
        Keyword {
            id: 1,
            phrase: phrase.to_string(),
            category: "shop".to_string(),
            language: "de".to_string(),
        }
    }

    #[test]
    fn stops_when_provider_has_no_next_page() -> Result<()> {
        let store = Store::open_in_memory()?;
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![
                page(&["a.example", "b.example"], true),
                page(&["c.example"], false),
                page(&["never.example"], true),
            ],
        );

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 5);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.stored, 3);
        assert_eq!(outcome.termination, Termination::Exhausted);
        assert_eq!(
            *provider.calls.borrow(),
            vec![("k".to_string(), 1), ("k".to_string(), 11)]
        );
        Ok(())
    }

    #[test]
    fn stops_at_page_budget() -> Result<()> {
        let store = Store::open_in_memory()?;
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![
                page(&["a.example"], true),
                page(&["b.example"], true),
                page(&["c.example"], true),
            ],
        );

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 2);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.termination, Termination::PageLimit);
        assert_eq!(store.results()?.len(), 2);
        Ok(())
    }

    #[test]
    fn rate_limit_on_first_page_is_reported_not_raised() -> Result<()> {
        let store = Store::open_in_memory()?;
        let provider =
            ScriptedProvider::new().with_pages("k", vec![Err(ProviderFailure::RateLimited)]);

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 3);
        assert_eq!(outcome.pages, 0);
        assert_eq!(outcome.stored, 0);
        assert_eq!(
            outcome.termination,
            Termination::Failed(ProviderFailure::RateLimited)
        );
        assert_eq!(outcome.failure(), Some(&ProviderFailure::RateLimited));
        Ok(())
    }

    #[test]
    fn failure_mid_crawl_keeps_earlier_items() -> Result<()> {
        let store = Store::open_in_memory()?;
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![
                page(&["a.example", "b.example"], true),
                Err(ProviderFailure::UnexpectedStatus(500)),
            ],
        );

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 3);
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.stored, 2);
        assert_eq!(
            outcome.termination,
            Termination::Failed(ProviderFailure::UnexpectedStatus(500))
        );
        assert_eq!(store.results()?.len(), 2);
        Ok(())
    }

    #[test]
    fn repeated_item_counts_as_a_write() -> Result<()> {
        let store = Store::open_in_memory()?;
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![page(&["a.example", "a.example"], false)],
        );

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 1);
        assert_eq!(outcome.stored, 2);
        assert_eq!(store.results()?.len(), 1);
        Ok(())
    }

    /// Cycles through a successful write, an error and a write that touches
    /// no rows.
    struct FlakyStore {
        inner: Store,
        calls: Cell<usize>,
    }

    impl ResultStore for FlakyStore {
        fn keywords(
            &self,
            category: &str,
            language: &str,
            limit: Option<usize>,
        ) -> Result<Vec<Keyword>> {
            self.inner.keywords(category, language, limit)
        }

        fn store_item(
            &self,
            domain: &str,
            url: &str,
            phrase: &str,
            keyword_id: i64,
            title: &str,
            provider: &str,
        ) -> Result<usize> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            match n % 3 {
                1 => anyhow::bail!("disk full"),
                2 => Ok(0),
                _ => self.inner.store_item(domain, url, phrase, keyword_id, title, provider),
            }
        }

        fn new_entries(
            &self,
            start: Date,
            end: Date,
            provider: Option<&str>,
        ) -> Result<Vec<Candidate>> {
            self.inner.new_entries(start, end, provider)
        }

        fn upsert_finding(&self, domain: &str, keyword_id: i64) -> Result<usize> {
            self.inner.upsert_finding(domain, keyword_id)
        }
    }

    #[test]
    fn write_failures_are_counted_and_do_not_stop_the_page() -> Result<()> {
        let store = FlakyStore {
            inner: Store::open_in_memory()?,
            calls: Cell::new(0),
        };
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![page(&["a.example", "b.example", "c.example", "d.example"], false)],
        );

        let outcome = Crawler::new(&provider, &store).crawl(&keyword("k"), 1);
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.write_failures, 2);
        assert_eq!(outcome.termination, Termination::Exhausted);
        Ok(())
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_logged_as_warnings() -> Result<()> {
        let store = FlakyStore {
            inner: Store::open_in_memory()?,
            calls: Cell::new(0),
        };
        let provider = ScriptedProvider::new().with_pages(
            "k",
            vec![page(&["a.example", "b.example", "c.example"], false)],
        );

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            Crawler::new(&provider, &store).crawl(&keyword("k"), 1)
        });

        let text = String::from_utf8(logs.0.lock().expect("log buffer").clone())?;
        let warnings: Vec<_> = text.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 2, "{text}");
        assert!(warnings.iter().any(|l| l.contains("failed to store result")));
        assert!(warnings.iter().any(|l| l.contains("result write affected no rows")));
        Ok(())
    }
}
