//! Concurrent fan-out over the three channel agents and the blend/ladder
//! logic that turns their outcomes into one verdict.
//!
//! The risk ladder is the core business rule of the system and its branch
//! order is load-bearing: a confirmed near-duplicate finding outranks any
//! channel failure, because "another channel's API was down" never makes a
//! discovered conflict less real.

use std::sync::Arc;

use chrono::Utc;
use priorscan_common::{
    Channel, ChannelOutcome, ExpandedInvention, MemoryRecord, NoveltyCheckRequest,
    NoveltyCheckResponse, PriorScanError, RiskLevel, TruthScores, HIGH_RISK_SIMILARITY,
    MODERATE_RISK_SIMILARITY, UNKNOWN_CHANNEL_SCORE,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::SearchAgent;
use crate::expander::InventionExpander;
use crate::memory::MemoryStore;
use crate::CompletionBackend;

/// Caller identity for optional result logging. The pipeline performs no
/// authentication; it trusts the caller resolved this already.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub user_id: String,
    pub project_id: Option<String>,
}

pub struct NoveltyChecker {
    expander: InventionExpander,
    web: SearchAgent,
    retail: SearchAgent,
    patent: SearchAgent,
    ai: Arc<dyn CompletionBackend>,
    memory: Option<Arc<dyn MemoryStore>>,
}

impl NoveltyChecker {
    pub fn new(
        ai: Arc<dyn CompletionBackend>,
        web: SearchAgent,
        retail: SearchAgent,
        patent: SearchAgent,
    ) -> Self {
        Self {
            expander: InventionExpander::new(ai.clone()),
            web,
            retail,
            patent,
            ai,
            memory: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Run a full novelty check. The only fatal error is having no AI
    /// provider at all; every other failure degrades into the response.
    pub async fn run_novelty_check(
        &self,
        request: &NoveltyCheckRequest,
        expansion: Option<ExpandedInvention>,
        context: Option<&RunContext>,
    ) -> Result<NoveltyCheckResponse, PriorScanError> {
        if !self.ai.is_configured() {
            return Err(PriorScanError::Config(
                "no AI provider configured: set ANTHROPIC_API_KEY or OPENROUTER_API_KEY"
                    .to_string(),
            ));
        }

        let expansion = match expansion {
            Some(expansion) => expansion.truncate_to_caps(),
            None => self.expander.expand(request).await,
        };

        // The channels are independent; none may block another.
        let (web, retail, patent) = tokio::join!(
            self.web.run(request, Some(&expansion)),
            self.retail.run(request, Some(&expansion)),
            self.patent.run(request, Some(&expansion)),
        );

        let overall_novelty_score = overall_score(&web, &retail, &patent);
        let risk_level = derive_risk_level(&[&web, &retail, &patent]);
        let (recommendation, next_steps) = guidance_for(risk_level);

        let web = web.into_result();
        let retail = retail.into_result();
        let patent = patent.into_result();
        let truth_scores = average_truth_scores(&[&web, &retail, &patent]);

        info!(
            risk = %risk_level,
            score = overall_novelty_score,
            web_findings = web.findings.len(),
            retail_findings = retail.findings.len(),
            patent_findings = patent.findings.len(),
            "Novelty check complete"
        );

        let response = NoveltyCheckResponse {
            run_id: Uuid::new_v4(),
            overall_novelty_score,
            risk_level,
            web,
            retail,
            patent,
            recommendation: recommendation.to_string(),
            next_steps,
            truth_scores,
            created_at: Utc::now(),
        };

        self.log_to_memory(request, &response, context).await;

        Ok(response)
    }

    /// Optional side effect; its failure never touches the returned
    /// response.
    async fn log_to_memory(
        &self,
        request: &NoveltyCheckRequest,
        response: &NoveltyCheckResponse,
        context: Option<&RunContext>,
    ) {
        let (Some(memory), Some(context)) = (self.memory.as_ref(), context) else {
            return;
        };
        let Some(project_id) = context.project_id.as_ref() else {
            return;
        };

        let record = MemoryRecord {
            id: Uuid::new_v4(),
            user_id: context.user_id.clone(),
            project_id: project_id.clone(),
            content: format!(
                "Novelty check for \"{}\": {} (score {:.2})",
                request.invention_name, response.risk_level, response.overall_novelty_score
            ),
            importance: response.overall_novelty_score,
            created_at: Utc::now(),
        };

        if let Err(err) = memory.append(record).await {
            warn!(error = %err, "Memory log append failed");
        }
    }
}

/// Per-channel novelty score: neutral when the channel is unknown, full
/// marks when the model judged it novel, otherwise the inverse of the
/// closest match.
fn channel_score(outcome: &ChannelOutcome) -> f64 {
    match outcome {
        ChannelOutcome::Failed { .. } => UNKNOWN_CHANNEL_SCORE,
        ChannelOutcome::Success(result) => {
            if result.is_novel {
                1.0
            } else {
                1.0 - result.max_similarity()
            }
        }
    }
}

fn overall_score(web: &ChannelOutcome, retail: &ChannelOutcome, patent: &ChannelOutcome) -> f64 {
    let score = Channel::Web.weight() * channel_score(web)
        + Channel::Retail.weight() * channel_score(retail)
        + Channel::Patent.weight() * channel_score(patent);
    score.clamp(0.0, 1.0)
}

/// The priority-ordered decision ladder. Branch order matters more than
/// any individual threshold; see the module docs.
fn derive_risk_level(outcomes: &[&ChannelOutcome; 3]) -> RiskLevel {
    let mut any_failed = false;
    let mut total_findings = 0usize;
    let mut max_similarity: f64 = 0.0;

    for outcome in outcomes {
        match outcome {
            ChannelOutcome::Failed { .. } => any_failed = true,
            ChannelOutcome::Success(result) => {
                total_findings += result.findings.len();
                max_similarity = max_similarity.max(result.max_similarity());
            }
        }
    }

    if max_similarity >= HIGH_RISK_SIMILARITY {
        RiskLevel::HighRisk
    } else if any_failed && total_findings == 0 {
        RiskLevel::Incomplete
    } else if any_failed && max_similarity >= MODERATE_RISK_SIMILARITY {
        RiskLevel::ModerateRisk
    } else if any_failed {
        RiskLevel::Incomplete
    } else if max_similarity >= MODERATE_RISK_SIMILARITY {
        RiskLevel::ModerateRisk
    } else {
        RiskLevel::LowRisk
    }
}

/// Recommendation and next steps keyed on the discrete decision, never the
/// raw score, so guidance can't contradict the displayed risk level.
fn guidance_for(risk: RiskLevel) -> (&'static str, Vec<String>) {
    match risk {
        RiskLevel::HighRisk => (
            "A close match to your idea already exists. Review the top findings carefully before investing further.",
            vec![
                "Study the closest matches and list exactly how your idea differs".to_string(),
                "Consider a design-around or a narrower differentiating feature".to_string(),
                "Consult a patent attorney before any filing or launch spend".to_string(),
            ],
        ),
        RiskLevel::ModerateRisk => (
            "Related work exists but no confirmed duplicate was found. Your differentiators will decide whether this is viable.",
            vec![
                "Compare your key features against the overlapping findings".to_string(),
                "Sharpen the differentiators that no finding covers".to_string(),
                "Run a professional prior-art search before filing".to_string(),
            ],
        ),
        RiskLevel::LowRisk => (
            "No meaningful overlap surfaced across web, retail, or patent sources. The idea looks novel on current evidence.",
            vec![
                "Document your invention date and development notes".to_string(),
                "Consider a provisional patent application to secure priority".to_string(),
                "Validate demand with your target audience".to_string(),
            ],
        ),
        RiskLevel::Incomplete => (
            "One or more search channels could not complete, so this result is partial. Treat it as a starting point, not a verdict.",
            vec![
                "Re-run the check once the unavailable channels are configured or recovered".to_string(),
                "Review the partial findings that did come back".to_string(),
                "Do not make filing decisions on incomplete coverage".to_string(),
            ],
        ),
    }
}

fn average_truth_scores(
    results: &[&priorscan_common::NoveltyResult; 3],
) -> TruthScores {
    let n = results.len() as f64;
    TruthScores {
        objective_truth: results.iter().map(|r| r.truth_scores.objective_truth).sum::<f64>() / n,
        practical_truth: results.iter().map(|r| r.truth_scores.practical_truth).sum::<f64>() / n,
        completeness: results.iter().map(|r| r.truth_scores.completeness).sum::<f64>() / n,
        contextual_scope: results.iter().map(|r| r.truth_scores.contextual_scope).sum::<f64>()
            / n,
    }
}
