//! General web search channel, backed by Serper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use priorscan_common::{Channel, NoveltyFinding};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::cache::SearchCache;
use crate::error::{classify_status, Result, SearchError};
use crate::pacer::RequestPacer;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::ChannelSearcher;

const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";

/// Serper's published quota allows one request per second per key.
const SERPER_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Results requested per query.
const DEFAULT_MAX_RESULTS: usize = 10;

pub struct WebSearchClient {
    api_key: Option<String>,
    http: reqwest::Client,
    cache: Arc<SearchCache>,
    pacer: RequestPacer,
    retry: RetryPolicy,
    max_results: usize,
    /// When non-empty, only results from these domains are kept.
    allowed_domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl WebSearchClient {
    pub fn new(api_key: Option<String>, cache: Arc<SearchCache>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            cache,
            pacer: RequestPacer::new(SERPER_MIN_INTERVAL),
            retry: RetryPolicy::default(),
            max_results: DEFAULT_MAX_RESULTS,
            allowed_domains: Vec::new(),
        }
    }

    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    async fn search_one(&self, query: &str) -> Result<Vec<NoveltyFinding>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SearchError::NotConfigured { provider: "Serper" })?;

        let params = json!({
            "q": query,
            "num": self.max_results,
            "domains": self.allowed_domains,
        });

        if let Some(hit) = self.cache.get(Channel::Web, &params) {
            return Ok(hit.results);
        }

        self.pacer.pace().await;

        let body = json!({
            "q": query,
            "num": self.max_results,
        });

        let data = retry_with_backoff(
            &self.retry,
            "serper_web_search",
            SearchError::is_retryable,
            || async {
                let resp = self
                    .http
                    .post(SERPER_SEARCH_URL)
                    .header("X-API-KEY", api_key)
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(classify_status("Serper", status.as_u16(), message));
                }

                resp.json::<SerperResponse>()
                    .await
                    .map_err(|e| SearchError::Parse(format!("Serper response: {e}")))
            },
        )
        .await?;

        let findings: Vec<NoveltyFinding> = data
            .organic
            .into_iter()
            .filter(|r| self.domain_allowed(&r.link))
            .map(|r| NoveltyFinding {
                title: r.title,
                description: r.snippet,
                url: Some(r.link),
                similarity_score: None,
                source: "web".to_string(),
                metadata: Default::default(),
            })
            .collect();

        info!(query, count = findings.len(), "Web search complete");

        self.cache
            .put(Channel::Web, &params, findings.clone(), "serper");

        Ok(findings)
    }

    fn domain_allowed(&self, link: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let Some(host) = url::Url::parse(link).ok().and_then(|u| u.host_str().map(String::from))
        else {
            return false;
        };
        self.allowed_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

#[async_trait]
impl ChannelSearcher for WebSearchClient {
    fn channel(&self) -> Channel {
        Channel::Web
    }

    async fn search(&self, queries: &[String]) -> Result<Vec<NoveltyFinding>> {
        let mut findings = Vec::new();
        let mut seen_urls = std::collections::HashSet::new();

        for query in queries {
            for finding in self.search_one(query).await? {
                let key = finding
                    .url
                    .clone()
                    .unwrap_or_else(|| finding.title.clone());
                if seen_urls.insert(key) {
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}
