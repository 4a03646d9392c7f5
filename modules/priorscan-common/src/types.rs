use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Policy constants ---

/// A single finding at or above this similarity is a confirmed near-duplicate
/// and forces a high-risk verdict, regardless of other channels' state.
pub const HIGH_RISK_SIMILARITY: f64 = 0.8;

/// Findings at or above this similarity indicate meaningful overlap.
pub const MODERATE_RISK_SIMILARITY: f64 = 0.5;

/// Channel weights for the overall novelty blend. Patents carry the most
/// weight as the most legally consequential signal. Must sum to 1.0.
pub const WEB_WEIGHT: f64 = 0.3;
pub const RETAIL_WEIGHT: f64 = 0.3;
pub const PATENT_WEIGHT: f64 = 0.4;

/// Neutral per-channel score when that channel's search could not complete.
pub const UNKNOWN_CHANNEL_SCORE: f64 = 0.5;

/// Confidence assigned when a channel returns zero findings without error.
/// Absence of evidence supports novelty, but more weakly than a hit refutes it.
pub const EMPTY_CHANNEL_CONFIDENCE: f64 = 0.6;

/// Cap on derived key features and per-channel query lists.
pub const MAX_QUERIES_PER_CHANNEL: usize = 5;
pub const MAX_KEY_FEATURES: usize = 5;

// --- Channels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Retail,
    Patent,
}

impl Channel {
    pub fn all() -> [Channel; 3] {
        [Channel::Web, Channel::Retail, Channel::Patent]
    }

    pub fn weight(self) -> f64 {
        match self {
            Channel::Web => WEB_WEIGHT,
            Channel::Retail => RETAIL_WEIGHT,
            Channel::Patent => PATENT_WEIGHT,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Web => write!(f, "web"),
            Channel::Retail => write!(f, "retail"),
            Channel::Patent => write!(f, "patent"),
        }
    }
}

// --- Pipeline input ---

/// Immutable input to the pipeline, one per user submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyCheckRequest {
    pub invention_name: String,
    pub description: String,
    pub problem_statement: Option<String>,
    pub target_audience: Option<String>,
    #[serde(default)]
    pub key_features: Vec<String>,
}

/// AI-enriched profile of a request. Computed once per run, consumed by the
/// agents for that run only; never persisted as its own entity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExpandedInvention {
    pub expanded_description: String,
    pub key_features: Vec<String>,
    pub product_category: String,
    pub differentiators: Vec<String>,
    pub web_queries: Vec<String>,
    pub retail_queries: Vec<String>,
    pub patent_queries: Vec<String>,
}

impl ExpandedInvention {
    /// Enforce the list caps. Applied after every construction path so no
    /// caller ever sees an over-long field.
    pub fn truncate_to_caps(mut self) -> Self {
        self.key_features.truncate(MAX_KEY_FEATURES);
        self.differentiators.truncate(MAX_KEY_FEATURES);
        self.web_queries.truncate(MAX_QUERIES_PER_CHANNEL);
        self.retail_queries.truncate(MAX_QUERIES_PER_CHANNEL);
        self.patent_queries.truncate(MAX_QUERIES_PER_CHANNEL);
        self
    }

    pub fn queries_for(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Web => &self.web_queries,
            Channel::Retail => &self.retail_queries,
            Channel::Patent => &self.patent_queries,
        }
    }
}

// --- Findings ---

/// One external search result. Channel clients produce these unscored;
/// the analysis step fills in similarity_score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyFinding {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    /// Invention-specific similarity in [0,1]. None until the semantic
    /// analysis step has scored the finding; None ranks as 0.
    pub similarity_score: Option<f64>,
    pub source: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NoveltyFinding {
    pub fn ranking_score(&self) -> f64 {
        self.similarity_score.unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

/// Four-axis confidence metadata attached to every channel result and to the
/// aggregate. completeness == 0 marks a channel whose underlying search
/// failed or produced no usable data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct TruthScores {
    pub objective_truth: f64,
    pub practical_truth: f64,
    pub completeness: f64,
    pub contextual_scope: f64,
}

impl TruthScores {
    pub fn zeroed() -> Self {
        Self {
            objective_truth: 0.0,
            practical_truth: 0.0,
            completeness: 0.0,
            contextual_scope: 0.0,
        }
    }

    /// Truth scores for an agent whose search succeeded but whose model
    /// analysis could not be parsed. Nonzero completeness keeps the channel
    /// counted as successful.
    pub fn degraded() -> Self {
        Self {
            objective_truth: 0.5,
            practical_truth: 0.5,
            completeness: 0.5,
            contextual_scope: 0.5,
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            objective_truth: self.objective_truth.clamp(0.0, 1.0),
            practical_truth: self.practical_truth.clamp(0.0, 1.0),
            completeness: self.completeness.clamp(0.0, 1.0),
            contextual_scope: self.contextual_scope.clamp(0.0, 1.0),
        }
    }
}

// --- Channel results ---

/// Why a channel produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Credentials for the channel's provider are absent.
    NotConfigured { provider: String },
    /// The provider rejected the configured credentials.
    InvalidCredentials { provider: String },
    /// Retries exhausted against a transient upstream condition.
    Upstream { detail: String },
    /// The provider rejected the request shape itself.
    BadRequest { detail: String },
}

impl FailureReason {
    pub fn summary(&self) -> String {
        match self {
            FailureReason::NotConfigured { provider } => {
                format!("{provider} is not configured; channel skipped")
            }
            FailureReason::InvalidCredentials { provider } => {
                format!("{provider} rejected the configured credentials")
            }
            FailureReason::Upstream { detail } => {
                format!("search failed after retries: {detail}")
            }
            FailureReason::BadRequest { detail } => {
                format!("search request was rejected: {detail}")
            }
        }
    }
}

/// Per-channel result embedded in the aggregate response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyResult {
    pub channel: Channel,
    pub is_novel: bool,
    pub confidence: f64,
    /// Ordered by descending similarity_score.
    pub findings: Vec<NoveltyFinding>,
    pub summary: String,
    pub truth_scores: TruthScores,
    pub queries_used: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NoveltyResult {
    pub fn max_similarity(&self) -> f64 {
        self.findings
            .iter()
            .map(|f| f.ranking_score())
            .fold(0.0, f64::max)
    }
}

/// Outcome of one channel agent. The aggregator's failure detection is a
/// match on this, not a sentinel comparison; the completeness-0 convention
/// only appears in the serialized response.
#[derive(Debug, Clone)]
pub enum ChannelOutcome {
    Success(NoveltyResult),
    Failed {
        channel: Channel,
        reason: FailureReason,
        queries_used: Vec<String>,
    },
}

impl ChannelOutcome {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelOutcome::Success(r) => r.channel,
            ChannelOutcome::Failed { channel, .. } => *channel,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed { .. })
    }

    /// Materialize the failure sentinel: a failed channel becomes a result
    /// with every truth axis at zero, no findings, and a summary naming the
    /// cause so callers can tell "tried and failed" from "never attempted".
    pub fn into_result(self) -> NoveltyResult {
        match self {
            ChannelOutcome::Success(r) => r,
            ChannelOutcome::Failed {
                channel,
                reason,
                queries_used,
            } => NoveltyResult {
                channel,
                is_novel: false,
                confidence: 0.0,
                findings: Vec::new(),
                summary: format!("{channel} channel unavailable: {}", reason.summary()),
                truth_scores: TruthScores::zeroed(),
                queries_used,
                created_at: Utc::now(),
            },
        }
    }
}

// --- Aggregate response ---

/// Discrete decision state driving user-facing recommendations. Derived by a
/// priority ladder, not a score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    HighRisk,
    ModerateRisk,
    LowRisk,
    Incomplete,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::HighRisk => write!(f, "high_risk"),
            RiskLevel::ModerateRisk => write!(f, "moderate_risk"),
            RiskLevel::LowRisk => write!(f, "low_risk"),
            RiskLevel::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// Aggregate verdict for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyCheckResponse {
    pub run_id: Uuid,
    /// Weighted blend of per-channel scores, kept alongside risk_level for
    /// callers that still display a numeric score.
    pub overall_novelty_score: f64,
    pub risk_level: RiskLevel,
    pub web: NoveltyResult,
    pub retail: NoveltyResult,
    pub patent: NoveltyResult,
    pub recommendation: String,
    pub next_steps: Vec<String>,
    pub truth_scores: TruthScores,
    pub created_at: DateTime<Utc>,
}

impl NoveltyCheckResponse {
    pub fn results(&self) -> [&NoveltyResult; 3] {
        [&self.web, &self.retail, &self.patent]
    }
}

// --- Memory log ---

/// One append-only memory entry emitted after a completed check when the
/// caller opted in by supplying a project id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: String,
    pub content: String,
    /// Importance equals the run's overall novelty score.
    pub importance: f64,
    pub created_at: DateTime<Utc>,
}
