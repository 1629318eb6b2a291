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

use anyhow::Result;
use serde::Serialize;

use crate::model::AggregationOutcome;
use crate::model::Finding;
use crate::model::Keyword;
use crate::model::ResultItem;
use crate::runner::RunReport;
use crate::store::StoreStats;

#[derive(Debug, Clone, Serialize)]
pub struct AggregationOut {
    pub start: String,
    pub end: String,
    pub provider: Option<String>,
    #[serde(flatten)]
    pub outcome: AggregationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<Keyword>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = Some(hint.to_string());
        }
        self
    }

    /// Envelope for a crawl run. A run that hit the provider rate limit is
    /// not ok, matching the non-zero exit status.
    pub fn for_crawl(report: RunReport) -> Self {
        let warnings = report
            .outcomes
            .iter()
            .filter_map(|o| o.failure().map(|f| format!("{}: {f}", o.phrase)))
            .collect();
        let resp = if report.rate_limited {
            Self::error("rate_limited", "search API limit reached during the run")
                .with_hint("rerun later or pass --continue-on-rate-limit")
        } else {
            Self::ok()
        };
        resp.with_crawl(report).with_warnings(warnings)
    }

    pub fn with_crawl(mut self, report: RunReport) -> Self {
        self.crawl = Some(report);
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationOut) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<Keyword>) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn with_results(mut self, results: Vec<ResultItem>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = Some(findings);
        self
    }

    pub fn with_stats(mut self, stats: StoreStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}
