//! End-to-end pipeline tests: NoveltyCheckRequest → NoveltyChecker →
//! NoveltyCheckResponse, with stub channel searchers and a stub AI backend.
//! No I/O, no network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use priorscan_common::{
    Channel, NoveltyCheckRequest, NoveltyFinding, RiskLevel,
};
use priorscan_engine::{
    CompletionBackend, InMemoryStore, NoveltyChecker, RunContext, SearchAgent,
};
use priorscan_search::{ChannelSearcher, Result as SearchResult, SearchError};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Findings(Vec<NoveltyFinding>),
    NotConfigured(&'static str),
    Upstream,
}

struct StubSearcher {
    channel: Channel,
    behavior: Behavior,
    seen_queries: Mutex<Vec<String>>,
}

impl StubSearcher {
    fn new(channel: Channel, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            channel,
            behavior,
            seen_queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChannelSearcher for StubSearcher {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn search(&self, queries: &[String]) -> SearchResult<Vec<NoveltyFinding>> {
        self.seen_queries
            .lock()
            .unwrap()
            .extend(queries.iter().cloned());
        match &self.behavior {
            Behavior::Findings(findings) => Ok(findings.clone()),
            Behavior::NotConfigured(provider) => {
                Err(SearchError::NotConfigured { provider })
            }
            Behavior::Upstream => Err(SearchError::Upstream {
                provider: "stub",
                status: 502,
                message: "bad gateway".to_string(),
            }),
        }
    }
}

/// Routes completions by the channel marker in the system prompt. A `None`
/// entry simulates a provider outage for that call.
#[derive(Default)]
struct StubAi {
    configured: bool,
    expansion: Option<String>,
    web: Option<String>,
    retail: Option<String>,
    patent: Option<String>,
}

impl StubAi {
    fn configured() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CompletionBackend for StubAi {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(
        &self,
        request: &ai_client::CompletionRequest,
    ) -> ai_client::Result<ai_client::Completion> {
        let system = request.system.as_deref().unwrap_or_default();
        let response = if system.contains("invention analyst") {
            &self.expansion
        } else if system.contains("general web search results") {
            &self.web
        } else if system.contains("retail product listings") {
            &self.retail
        } else if system.contains("patent filings") {
            &self.patent
        } else {
            &None
        };

        match response {
            Some(text) => Ok(ai_client::Completion {
                text: text.clone(),
                provider: ai_client::Provider::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
            }),
            None => Err(ai_client::AiError::Network("stub outage".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn finding(title: &str, source: &str) -> NoveltyFinding {
    NoveltyFinding {
        title: title.to_string(),
        description: "a competing product".to_string(),
        url: Some(format!("https://example.com/{title}")),
        similarity_score: None,
        source: source.to_string(),
        metadata: Default::default(),
    }
}

fn analysis_json(similarity: f64) -> String {
    format!(
        r#"{{"findings":[{{"index":0,"similarity_score":{similarity}}}],"is_novel":false,"confidence":0.9,"summary":"close match found","truth_scores":{{"objective_truth":0.8,"practical_truth":0.8,"completeness":0.9,"contextual_scope":0.7}}}}"#
    )
}

fn request(name: &str) -> NoveltyCheckRequest {
    NoveltyCheckRequest {
        invention_name: name.to_string(),
        description: format!("{name} with a folding mechanism"),
        problem_statement: None,
        target_audience: None,
        key_features: vec![],
    }
}

fn checker(
    ai: StubAi,
    web: Arc<StubSearcher>,
    retail: Arc<StubSearcher>,
    patent: Arc<StubSearcher>,
) -> NoveltyChecker {
    let ai: Arc<dyn CompletionBackend> = Arc::new(ai);
    NoveltyChecker::new(
        ai.clone(),
        SearchAgent::new(web, ai.clone()),
        SearchAgent::new(retail, ai.clone()),
        SearchAgent::new(patent, ai),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn web_high_conflict_forces_high_risk() {
    let ai = StubAi {
        web: Some(analysis_json(0.9)),
        ..StubAi::configured()
    };
    let checker = checker(
        ai,
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![finding("clone", "web")])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::Findings(vec![])),
    );

    let response = checker
        .run_novelty_check(&request("Foldable Solar Charger"), None, None)
        .await
        .unwrap();

    assert_eq!(response.risk_level, RiskLevel::HighRisk);
    assert_eq!(response.web.findings[0].similarity_score, Some(0.9));
    // Retail and patent legitimately returned nothing and stayed successful.
    assert!(response.retail.truth_scores.completeness > 0.0);
    assert!(response.patent.truth_scores.completeness > 0.0);
}

#[tokio::test]
async fn all_clear_run_is_low_risk_with_full_score() {
    let checker = checker(
        StubAi::configured(),
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::Findings(vec![])),
    );

    let response = checker
        .run_novelty_check(&request("Unique Puzzle Toy"), None, None)
        .await
        .unwrap();

    assert_eq!(response.risk_level, RiskLevel::LowRisk);
    assert_eq!(response.overall_novelty_score, 1.0);
    for result in response.results() {
        assert!(result.is_novel);
        assert!(result.findings.is_empty());
    }
}

#[tokio::test]
async fn missing_patent_credentials_yield_incomplete() {
    let checker = checker(
        StubAi::configured(),
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::NotConfigured("PatentsView")),
    );

    let response = checker
        .run_novelty_check(&request("Foldable Solar Charger"), None, None)
        .await
        .unwrap();

    assert_eq!(response.risk_level, RiskLevel::Incomplete);
    assert_eq!(response.patent.truth_scores.completeness, 0.0);
    assert!(response.patent.summary.contains("not configured"));
    // The recommendation tracks the discrete level, not the numeric score.
    assert!(response.recommendation.contains("partial"));
}

#[tokio::test]
async fn channel_failures_never_mask_a_confirmed_conflict() {
    let ai = StubAi {
        retail: Some(analysis_json(0.85)),
        ..StubAi::configured()
    };
    let checker = checker(
        ai,
        StubSearcher::new(Channel::Web, Behavior::Upstream),
        StubSearcher::new(
            Channel::Retail,
            Behavior::Findings(vec![finding("lookalike", "retail")]),
        ),
        StubSearcher::new(Channel::Patent, Behavior::Upstream),
    );

    let response = checker
        .run_novelty_check(&request("Foldable Solar Charger"), None, None)
        .await
        .unwrap();

    assert_eq!(response.risk_level, RiskLevel::HighRisk);
    assert_eq!(response.web.truth_scores.completeness, 0.0);
    assert_eq!(response.patent.truth_scores.completeness, 0.0);
}

#[tokio::test]
async fn totally_unconfigured_ai_fails_loudly() {
    let checker = checker(
        StubAi::default(), // not configured
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::Findings(vec![])),
    );

    let err = checker
        .run_novelty_check(&request("Anything"), None, None)
        .await
        .expect_err("no AI provider configured");
    assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
}

#[tokio::test]
async fn caller_supplied_expansion_routes_channel_queries() {
    let web = StubSearcher::new(Channel::Web, Behavior::Findings(vec![]));
    let retail = StubSearcher::new(Channel::Retail, Behavior::Findings(vec![]));
    let patent = StubSearcher::new(Channel::Patent, Behavior::Findings(vec![]));
    let checker = checker(
        StubAi::configured(),
        web.clone(),
        retail.clone(),
        patent.clone(),
    );

    let expansion = priorscan_common::ExpandedInvention {
        expanded_description: "folding photovoltaic charger".to_string(),
        key_features: vec!["origami hinge".to_string()],
        product_category: "outdoor electronics".to_string(),
        differentiators: vec![],
        web_queries: vec!["folding solar charger review".to_string()],
        retail_queries: vec!["portable solar panel charger".to_string()],
        patent_queries: vec!["photovoltaic panel folding hinge".to_string()],
    };

    checker
        .run_novelty_check(&request("Foldable Solar Charger"), Some(expansion), None)
        .await
        .unwrap();

    assert_eq!(
        *web.seen_queries.lock().unwrap(),
        vec!["folding solar charger review".to_string()]
    );
    assert_eq!(
        *retail.seen_queries.lock().unwrap(),
        vec!["portable solar panel charger".to_string()]
    );
    assert_eq!(
        *patent.seen_queries.lock().unwrap(),
        vec!["photovoltaic panel folding hinge".to_string()]
    );
}

#[tokio::test]
async fn memory_log_records_importance_equal_to_score() {
    let memory = Arc::new(InMemoryStore::new());
    let checker = checker(
        StubAi::configured(),
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::Findings(vec![])),
    )
    .with_memory(memory.clone());

    let context = RunContext {
        user_id: "inventor-7".to_string(),
        project_id: Some("project-42".to_string()),
    };
    let response = checker
        .run_novelty_check(&request("Unique Puzzle Toy"), None, Some(&context))
        .await
        .unwrap();

    let records = memory.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].project_id, "project-42");
    assert_eq!(records[0].importance, response.overall_novelty_score);
}

#[tokio::test]
async fn no_project_id_means_no_memory_entry() {
    let memory = Arc::new(InMemoryStore::new());
    let checker = checker(
        StubAi::configured(),
        StubSearcher::new(Channel::Web, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Retail, Behavior::Findings(vec![])),
        StubSearcher::new(Channel::Patent, Behavior::Findings(vec![])),
    )
    .with_memory(memory.clone());

    let context = RunContext {
        user_id: "inventor-7".to_string(),
        project_id: None,
    };
    checker
        .run_novelty_check(&request("Unique Puzzle Toy"), None, Some(&context))
        .await
        .unwrap();

    assert!(memory.records().is_empty());
}
