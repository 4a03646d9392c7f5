//! Patent registry channel.
//!
//! Two sources merged per query: the PatentsView granted-patent index
//! (primary, broad coverage) and the USPTO PTAB proceedings index
//! (supplementary). A patent that shows up in PTAB is under dispute, which
//! is a stronger prior-art risk signal than an uncontested grant, so those
//! findings carry a `challenged` flag. Entries are deduplicated by
//! normalized patent number.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use priorscan_common::{Channel, NoveltyFinding};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::cache::SearchCache;
use crate::error::{classify_status, Result, SearchError};
use crate::pacer::RequestPacer;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::ChannelSearcher;

const PATENTSVIEW_URL: &str = "https://search.patentsview.org/api/v1/patent/";
const PTAB_URL: &str = "https://developer.uspto.gov/ptab-api/proceedings";

/// PatentsView allows 45 requests/minute; 2s spacing keeps both sources
/// comfortably inside quota.
const PATENT_MIN_INTERVAL: Duration = Duration::from_secs(2);

const DEFAULT_MAX_RESULTS: usize = 10;

pub struct PatentSearchClient {
    api_key: Option<String>,
    http: reqwest::Client,
    cache: Arc<SearchCache>,
    pacer: RequestPacer,
    retry: RetryPolicy,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct PatentsViewResponse {
    #[serde(default)]
    patents: Vec<PatentRecord>,
}

#[derive(Debug, Deserialize)]
struct PatentRecord {
    #[serde(default)]
    patent_id: String,
    #[serde(default)]
    patent_title: String,
    #[serde(default)]
    patent_abstract: Option<String>,
    #[serde(default)]
    patent_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PtabResponse {
    #[serde(default)]
    results: Vec<PtabProceeding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PtabProceeding {
    #[serde(default)]
    respondent_patent_number: Option<String>,
    #[serde(default)]
    proceeding_number: Option<String>,
    #[serde(default)]
    proceeding_type_category: Option<String>,
    #[serde(default)]
    respondent_party_name: Option<String>,
    #[serde(default)]
    respondent_inventor_name: Option<String>,
}

impl PatentSearchClient {
    pub fn new(api_key: Option<String>, cache: Arc<SearchCache>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            cache,
            pacer: RequestPacer::new(PATENT_MIN_INTERVAL),
            retry: RetryPolicy::default(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    async fn search_one(&self, query: &str) -> Result<Vec<NoveltyFinding>> {
        let api_key = self.api_key.as_deref().ok_or(SearchError::NotConfigured {
            provider: "PatentsView",
        })?;

        let params = json!({
            "q": query,
            "size": self.max_results,
        });

        if let Some(hit) = self.cache.get(Channel::Patent, &params) {
            return Ok(hit.results);
        }

        let granted = match self.granted_search(api_key, query).await {
            Ok(granted) => granted,
            // Overly complex queries are a known cause of 400s here; one
            // simplified retry before giving up.
            Err(SearchError::BadRequest { .. }) => {
                let simplified = simplify_query(query);
                if simplified == query {
                    return Err(SearchError::BadRequest {
                        provider: "PatentsView",
                        detail: format!("query rejected: {query}"),
                    });
                }
                warn!(query, simplified, "Patent query rejected, retrying simplified");
                self.granted_search(api_key, &simplified).await?
            }
            Err(err) => return Err(err),
        };

        let disputed = match self.ptab_search(query).await {
            Ok(disputed) => disputed,
            // PTAB is supplementary coverage; its failure costs only the
            // challenge flags, not the channel.
            Err(err) => {
                warn!(query, error = %err, "PTAB lookup failed, continuing without dispute data");
                Vec::new()
            }
        };

        let findings = merge_sources(granted, disputed, self.max_results);

        info!(query, count = findings.len(), "Patent search complete");

        self.cache
            .put(Channel::Patent, &params, findings.clone(), "patentsview+ptab");

        Ok(findings)
    }

    async fn granted_search(&self, api_key: &str, query: &str) -> Result<Vec<PatentRecord>> {
        self.pacer.pace().await;

        let body = json!({
            "q": { "_text_any": { "patent_title": query } },
            "f": ["patent_id", "patent_title", "patent_abstract", "patent_date"],
            "o": { "size": self.max_results },
        });

        let data = retry_with_backoff(
            &self.retry,
            "patentsview_search",
            SearchError::is_retryable,
            || async {
                let resp = self
                    .http
                    .post(PATENTSVIEW_URL)
                    .header("X-Api-Key", api_key)
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(classify_status("PatentsView", status.as_u16(), message));
                }

                resp.json::<PatentsViewResponse>()
                    .await
                    .map_err(|e| SearchError::Parse(format!("PatentsView response: {e}")))
            },
        )
        .await?;

        Ok(data.patents)
    }

    async fn ptab_search(&self, query: &str) -> Result<Vec<PtabProceeding>> {
        self.pacer.pace().await;

        let data = retry_with_backoff(
            &self.retry,
            "ptab_search",
            SearchError::is_retryable,
            || async {
                let resp = self
                    .http
                    .get(PTAB_URL)
                    .query(&[
                        ("patentTitle", query),
                        ("recordTotalQuantity", "20"),
                    ])
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(classify_status("PTAB", status.as_u16(), message));
                }

                resp.json::<PtabResponse>()
                    .await
                    .map_err(|e| SearchError::Parse(format!("PTAB response: {e}")))
            },
        )
        .await?;

        Ok(data.results)
    }
}

/// Strip a patent identifier down to its digits so "US10,123,456 B2",
/// "10123456" and "US10123456B2" all collide.
fn normalize_patent_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Drop everything but letters, digits and spaces, then keep the first four
/// words. Complex boolean-ish phrasing is what PatentsView rejects.
fn simplify_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

fn merge_sources(
    granted: Vec<PatentRecord>,
    disputed: Vec<PtabProceeding>,
    cap: usize,
) -> Vec<NoveltyFinding> {
    let mut challenged: HashMap<String, &PtabProceeding> = HashMap::new();
    for proceeding in &disputed {
        if let Some(number) = proceeding.respondent_patent_number.as_deref() {
            let normalized = normalize_patent_number(number);
            if !normalized.is_empty() {
                challenged.entry(normalized).or_insert(proceeding);
            }
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut findings = Vec::new();

    for patent in granted {
        let normalized = normalize_patent_number(&patent.patent_id);
        if !normalized.is_empty() && !seen.insert(normalized.clone()) {
            continue;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("patent_number".to_string(), json!(patent.patent_id));
        if let Some(date) = &patent.patent_date {
            metadata.insert("grant_date".to_string(), json!(date));
        }
        if let Some(proceeding) = challenged.get(&normalized) {
            metadata.insert("challenged".to_string(), json!(true));
            if let Some(number) = &proceeding.proceeding_number {
                metadata.insert("proceeding_number".to_string(), json!(number));
            }
            if let Some(kind) = &proceeding.proceeding_type_category {
                metadata.insert("proceeding_type".to_string(), json!(kind));
            }
        }

        findings.push(NoveltyFinding {
            title: patent.patent_title,
            description: patent.patent_abstract.unwrap_or_default(),
            url: Some(format!(
                "https://patents.google.com/patent/US{}",
                patent.patent_id
            )),
            similarity_score: None,
            source: "patent".to_string(),
            metadata,
        });
    }

    // Disputed patents absent from the granted page still matter: a
    // challenge proceeding is itself prior-art evidence.
    for proceeding in &disputed {
        let Some(number) = proceeding.respondent_patent_number.as_deref() else {
            continue;
        };
        let normalized = normalize_patent_number(number);
        if normalized.is_empty() || !seen.insert(normalized) {
            continue;
        }

        let owner = proceeding
            .respondent_party_name
            .clone()
            .or_else(|| proceeding.respondent_inventor_name.clone())
            .unwrap_or_default();

        let mut metadata = BTreeMap::new();
        metadata.insert("patent_number".to_string(), json!(number));
        metadata.insert("challenged".to_string(), json!(true));
        if let Some(num) = &proceeding.proceeding_number {
            metadata.insert("proceeding_number".to_string(), json!(num));
        }
        if let Some(kind) = &proceeding.proceeding_type_category {
            metadata.insert("proceeding_type".to_string(), json!(kind));
        }

        findings.push(NoveltyFinding {
            title: format!("Challenged patent US{number}"),
            description: if owner.is_empty() {
                "Patent under PTAB review".to_string()
            } else {
                format!("Patent under PTAB review, held by {owner}")
            },
            url: Some(format!("https://patents.google.com/patent/US{number}")),
            similarity_score: None,
            source: "patent".to_string(),
            metadata,
        });
    }

    findings.truncate(cap);
    findings
}

#[async_trait]
impl ChannelSearcher for PatentSearchClient {
    fn channel(&self) -> Channel {
        Channel::Patent
    }

    async fn search(&self, queries: &[String]) -> Result<Vec<NoveltyFinding>> {
        let mut findings = Vec::new();
        let mut seen = HashSet::new();

        for query in queries {
            for finding in self.search_one(query).await? {
                let key = finding
                    .metadata
                    .get("patent_number")
                    .and_then(|v| v.as_str())
                    .map(normalize_patent_number)
                    .unwrap_or_else(|| finding.title.clone());
                if seen.insert(key) {
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}
