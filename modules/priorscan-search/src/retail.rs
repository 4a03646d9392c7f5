//! Retail/product search channel, backed by Serper Shopping.

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

const SERPER_SHOPPING_URL: &str = "https://google.serper.dev/shopping";

const SERPER_MIN_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_MAX_RESULTS: usize = 10;

pub struct RetailSearchClient {
    api_key: Option<String>,
    http: reqwest::Client,
    cache: Arc<SearchCache>,
    pacer: RequestPacer,
    retry: RetryPolicy,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ShoppingResponse {
    #[serde(default)]
    shopping: Vec<ShoppingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShoppingResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    rating_count: Option<u64>,
}

impl RetailSearchClient {
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
        }
    }

    async fn search_one(&self, query: &str) -> Result<Vec<NoveltyFinding>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SearchError::NotConfigured { provider: "Serper" })?;

        let params = json!({
            "q": query,
            "num": self.max_results,
        });

        if let Some(hit) = self.cache.get(Channel::Retail, &params) {
            return Ok(hit.results);
        }

        self.pacer.pace().await;

        let data = retry_with_backoff(
            &self.retry,
            "serper_shopping_search",
            SearchError::is_retryable,
            || async {
                let resp = self
                    .http
                    .post(SERPER_SHOPPING_URL)
                    .header("X-API-KEY", api_key)
                    .header("Content-Type", "application/json")
                    .json(&params)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(classify_status("Serper", status.as_u16(), message));
                }

                resp.json::<ShoppingResponse>()
                    .await
                    .map_err(|e| SearchError::Parse(format!("Serper shopping response: {e}")))
            },
        )
        .await?;

        let findings: Vec<NoveltyFinding> = data
            .shopping
            .into_iter()
            .take(self.max_results)
            .map(|product| {
                let mut metadata = std::collections::BTreeMap::new();
                if let Some(price) = product.price {
                    metadata.insert("price".to_string(), json!(price));
                }
                if !product.source.is_empty() {
                    metadata.insert("merchant".to_string(), json!(product.source));
                }
                if let Some(image_url) = product.image_url {
                    metadata.insert("image_url".to_string(), json!(image_url));
                }
                if let Some(rating) = product.rating {
                    metadata.insert("rating".to_string(), json!(rating));
                }
                if let Some(count) = product.rating_count {
                    metadata.insert("rating_count".to_string(), json!(count));
                }

                NoveltyFinding {
                    title: product.title,
                    description: String::new(),
                    url: if product.link.is_empty() {
                        None
                    } else {
                        Some(product.link)
                    },
                    similarity_score: None,
                    source: "retail".to_string(),
                    metadata,
                }
            })
            .collect();

        info!(query, count = findings.len(), "Retail search complete");

        self.cache
            .put(Channel::Retail, &params, findings.clone(), "serper");

        Ok(findings)
    }
}

#[async_trait]
impl ChannelSearcher for RetailSearchClient {
    fn channel(&self) -> Channel {
        Channel::Retail
    }

    async fn search(&self, queries: &[String]) -> Result<Vec<NoveltyFinding>> {
        let mut findings = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for query in queries {
            for finding in self.search_one(query).await? {
                let key = finding
                    .url
                    .clone()
                    .unwrap_or_else(|| finding.title.clone());
                if seen.insert(key) {
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}
