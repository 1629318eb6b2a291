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

//! Google Custom Search JSON API binding.

use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use super::Page;
use super::ProviderResult;
use super::SearchProvider;
use crate::config::Config;
use crate::config::GoogleConfig;
use crate::error::ConfigError;
use crate::error::ProviderFailure;
use crate::model::PageItem;

pub const NAME: &str = "google";

/// The API refuses `num` values above 10.
const PAGE_SIZE: usize = 10;

pub fn factory(config: &Config) -> Result<Box<dyn SearchProvider>> {
    Ok(Box::new(GoogleProvider::new(&config.google)?))
}

pub struct GoogleProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
    engine_id: String,
}

impl GoogleProvider {
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ConfigError::MissingCredential("google.api_key").into());
        }
        if config.engine_id.is_empty() {
            return Err(ConfigError::MissingCredential("google.engine_id").into());
        }
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("parse google endpoint {}", config.endpoint))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
        })
    }

    fn request_url(&self, phrase: &str, offset: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("cx", &self.engine_id)
            .append_pair("start", &offset.to_string())
            .append_pair("num", &PAGE_SIZE.to_string())
            .append_pair("q", phrase);
        url
    }
}

impl SearchProvider for GoogleProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn query(&self, phrase: &str, offset: usize) -> ProviderResult {
        let url = self.request_url(phrase, offset);
        debug!(phrase, offset, "querying google custom search");
        let response = self.client.get(url).send().map_err(|err| {
            if err.is_timeout() {
                ProviderFailure::Transport("request timed out".to_string())
            } else {
                ProviderFailure::Transport(err.without_url().to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ProviderFailure::Transport(err.without_url().to_string()))?;
        parse_response(status, &body)
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    items: Vec<ApiItem>,
    #[serde(default)]
    queries: ApiQueries,
}

#[derive(Deserialize, Default)]
struct ApiQueries {
    #[serde(rename = "nextPage")]
    next_page: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiItem {
    #[serde(rename = "displayLink")]
    display_link: String,
    link: String,
    #[serde(default)]
    title: String,
}

/// Classifies a raw API response. A missing `items` array means zero hits.
fn parse_response(status: StatusCode, body: &str) -> ProviderResult {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderFailure::RateLimited);
    }
    if status != StatusCode::OK {
        return Err(ProviderFailure::UnexpectedStatus(status.as_u16()));
    }
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|err| ProviderFailure::Transport(format!("malformed response body: {err}")))?;
    let items = parsed
        .items
        .into_iter()
        .take(PAGE_SIZE)
        .map(|item| PageItem {
            domain: item.display_link,
            url: item.link,
            title: item.title,
        })
        .collect();
    Ok(Page {
        items,
        has_next: parsed.queries.next_page.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new(&GoogleConfig {
            api_key: "key123".to_string(),
            engine_id: "cx456".to_string(),
            ..GoogleConfig::default()
        })
        .expect("provider")
    }

    #[test]
    fn request_url_carries_offset_and_encoded_phrase() {
        let url = provider().request_url("günstig & schnell", 11);
        assert_eq!(url.host_str(), Some("www.googleapis.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("key".to_string(), "key123".to_string()),
                ("cx".to_string(), "cx456".to_string()),
                ("start".to_string(), "11".to_string()),
                ("num".to_string(), "10".to_string()),
                ("q".to_string(), "günstig & schnell".to_string()),
            ]
        );
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn parses_items_and_next_page() {
        let body = r#"{
            "queries": {"request": [{"startIndex": 1}], "nextPage": [{"startIndex": 11}]},
            "items": [
                {
                    "displayLink": "cheap-shoes.example",
                    "link": "https://cheap-shoes.example/sale",
                    "title": "Sale"
                },
                {"displayLink": "bags.example", "link": "https://bags.example/", "title": "Bags"}
            ]
        }"#;
        let page = parse_response(StatusCode::OK, body).expect("page");
        assert!(page.has_next);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].domain, "cheap-shoes.example");
        assert_eq!(page.items[0].url, "https://cheap-shoes.example/sale");
        assert_eq!(page.items[1].title, "Bags");
    }

    #[test]
    fn missing_items_is_an_empty_last_page() {
        let body = r#"{"queries": {"request": [{"startIndex": 91}]}, "searchInformation": {"totalResults": "0"}}"#;
        let page = parse_response(StatusCode::OK, body).expect("page");
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn classifies_failures() {
        assert_eq!(
            parse_response(StatusCode::TOO_MANY_REQUESTS, "{}"),
            Err(ProviderFailure::RateLimited)
        );
        assert_eq!(
            parse_response(StatusCode::FORBIDDEN, "{}"),
            Err(ProviderFailure::UnexpectedStatus(403))
        );
        assert!(matches!(
            parse_response(StatusCode::OK, "<html>"),
            Err(ProviderFailure::Transport(_))
        ));
    }

    #[test]
    fn new_rejects_missing_engine_id() {
        let err = GoogleProvider::new(&GoogleConfig {
            api_key: "key".to_string(),
            ..GoogleConfig::default()
        })
        .err()
        .expect("missing engine id");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingCredential("google.engine_id"))
        );
    }
}
