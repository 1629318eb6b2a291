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

//! Promotion of newly observed domains into the findings table.

use anyhow::Result;
use time::Date;
use time::macros::format_description;
use tracing::info;
use tracing::warn;

use crate::error::ConfigError;
use crate::model::ANY;
use crate::model::AggregationOutcome;
use crate::store::ResultStore;

/// Parses a window bound given as `YYYY-MM-DD`.
pub fn parse_day(text: &str) -> std::result::Result<Date, ConfigError> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ConfigError::InvalidDate(text.to_string()))
}

/// Promotes every domain first seen in `[start, end]` (both days inclusive)
/// that is not a finding yet.
///
/// The range is not validated: `start > end` selects nothing and reports
/// `NoNewEntriesInWindow`. Reading candidates may fail as a whole; individual
/// finding writes are tallied instead.
pub fn aggregate(
    store: &dyn ResultStore,
    start: Date,
    end: Date,
    provider: Option<&str>,
) -> Result<AggregationOutcome> {
    let candidates = store.new_entries(start, end, provider)?;
    if candidates.is_empty() {
        info!(%start, %end, provider = provider.unwrap_or(ANY), "no new entries in window");
        return Ok(AggregationOutcome::NoNewEntriesInWindow);
    }

    let attempted = candidates.len();
    let mut succeeded = 0usize;
    for candidate in &candidates {
        match store.upsert_finding(&candidate.domain, candidate.keyword_id) {
            Ok(rows) if rows > 0 => succeeded += 1,
            Ok(_) => warn!(domain = %candidate.domain, "finding write affected no rows"),
            Err(err) => warn!(
                domain = %candidate.domain,
                error = %format!("{err:#}"),
                "failed to store finding"
            ),
        }
    }

    info!(attempted, succeeded, "findings aggregated");
    if succeeded == attempted {
        Ok(AggregationOutcome::Success { count: succeeded })
    } else {
        Ok(AggregationOutcome::PartialFailure {
            attempted,
            succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;
    use time::macros::datetime;

    use super::*;
    use crate::model::Candidate;
    use crate::model::Keyword;
    use crate::store::Store;

    fn store_with_results() -> Result<Store> {
        let store = Store::open_in_memory()?;
        let ts = datetime!(2024-06-15 09:30:00 UTC);
        for domain in ["a.example", "b.example", "c.example"] {
            store.store_item_at(domain, &format!("https://{domain}/"), "p", 1, "", "google", ts)?;
        }
        Ok(store)
    }

    #[test]
    fn parses_calendar_days_only() {
        assert_eq!(parse_day("2024-02-29"), Ok(date!(2024-02-29)));
        for bad in ["2023-02-29", "2024-13-01", "2024-1-5", "24-01-05", "2024/01/05", ""] {
            assert_eq!(
                parse_day(bad),
                Err(ConfigError::InvalidDate(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn promotes_new_domains_once() -> Result<()> {
        let store = store_with_results()?;
        let first = aggregate(&store, date!(2024-06-01), date!(2024-06-30), Some("google"))?;
        assert_eq!(first, AggregationOutcome::Success { count: 3 });
        assert_eq!(store.findings()?.len(), 3);

        let second = aggregate(&store, date!(2024-06-01), date!(2024-06-30), Some("google"))?;
        assert_eq!(second, AggregationOutcome::NoNewEntriesInWindow);
        assert_eq!(store.findings()?.len(), 3);
        Ok(())
    }

    #[test]
    fn empty_window_reports_no_entries() -> Result<()> {
        let store = store_with_results()?;
        let outcome = aggregate(&store, date!(2024-07-01), date!(2024-07-31), None)?;
        assert_eq!(outcome, AggregationOutcome::NoNewEntriesInWindow);
        assert!(store.findings()?.is_empty());
        Ok(())
    }

    #[test]
    fn inverted_range_selects_nothing() -> Result<()> {
        let store = store_with_results()?;
        let outcome = aggregate(&store, date!(2024-06-30), date!(2024-06-01), None)?;
        assert_eq!(outcome, AggregationOutcome::NoNewEntriesInWindow);
        Ok(())
    }

    #[test]
    fn provider_filter_excludes_other_engines() -> Result<()> {
        let store = store_with_results()?;
        let outcome = aggregate(&store, date!(2024-06-01), date!(2024-06-30), Some("bing"))?;
        assert_eq!(outcome, AggregationOutcome::NoNewEntriesInWindow);
        Ok(())
    }

    /// Fails finding writes for the listed domains.
    struct RejectingStore {
        inner: Store,
        reject: Vec<&'static str>,
    }

    impl ResultStore for RejectingStore {
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
            self.inner.store_item(domain, url, phrase, keyword_id, title, provider)
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
            if self.reject.iter().any(|r| *r == domain) {
                anyhow::bail!("lock wait timeout");
            }
            self.inner.upsert_finding(domain, keyword_id)
        }
    }

    #[test]
    fn failed_writes_yield_partial_failure() -> Result<()> {
        let store = RejectingStore {
            inner: store_with_results()?,
            reject: vec!["b.example"],
        };
        let outcome = aggregate(&store, date!(2024-06-01), date!(2024-06-30), None)?;
        assert_eq!(
            outcome,
            AggregationOutcome::PartialFailure {
                attempted: 3,
                succeeded: 2
            }
        );
        assert_eq!(store.inner.findings()?.len(), 2);
        Ok(())
    }

    #[test]
    fn all_writes_failing_is_still_partial_failure() -> Result<()> {
        let store = RejectingStore {
            inner: store_with_results()?,
            reject: vec!["a.example", "b.example", "c.example"],
        };
        let outcome = aggregate(&store, date!(2024-06-01), date!(2024-06-30), None)?;
        assert_eq!(
            outcome,
            AggregationOutcome::PartialFailure {
                attempted: 3,
                succeeded: 0
            }
        );
        Ok(())
    }
}
