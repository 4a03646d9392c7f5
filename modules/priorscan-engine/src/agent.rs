//! Per-channel search agents.
//!
//! Each agent runs a two-phase pipeline: acquire findings through its
//! channel client (cache-fronted), then have the model score those findings
//! against the specific invention. Only the second phase can assign
//! similarity, because the channel API knows relevance-to-query, not
//! relevance-to-invention. Failures stay inside the agent: the aggregator
//! receives an outcome, never an error.

use std::sync::Arc;

use ai_client::CompletionRequest;
use chrono::Utc;
use priorscan_common::keywords::generate_search_queries;
use priorscan_common::{
    Channel, ChannelOutcome, ExpandedInvention, NoveltyCheckRequest, NoveltyFinding,
    NoveltyResult, TruthScores, EMPTY_CHANNEL_CONFIDENCE,
};
use priorscan_search::ChannelSearcher;
use serde::Deserialize;
use tracing::{info, warn};

use crate::model_output::{parse_json, ParseError};
use crate::CompletionBackend;

/// Findings included in an analysis prompt; more adds tokens, not signal.
const MAX_FINDINGS_FOR_ANALYSIS: usize = 10;

/// Per-finding description budget in the analysis prompt.
const MAX_DESCRIPTION_CHARS: usize = 500;

pub struct SearchAgent {
    channel: Channel,
    searcher: Arc<dyn ChannelSearcher>,
    ai: Arc<dyn CompletionBackend>,
}

/// Model output shape for the analysis phase.
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    findings: Vec<FindingScore>,
    is_novel: Option<bool>,
    confidence: Option<f64>,
    #[serde(default)]
    summary: String,
    truth_scores: Option<RawTruthScores>,
}

#[derive(Debug, Deserialize)]
struct FindingScore {
    index: usize,
    similarity_score: f64,
}

#[derive(Debug, Deserialize)]
struct RawTruthScores {
    #[serde(default)]
    objective_truth: f64,
    #[serde(default)]
    practical_truth: f64,
    #[serde(default)]
    completeness: f64,
    #[serde(default)]
    contextual_scope: f64,
}

impl SearchAgent {
    pub fn new(searcher: Arc<dyn ChannelSearcher>, ai: Arc<dyn CompletionBackend>) -> Self {
        Self {
            channel: searcher.channel(),
            searcher,
            ai,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Run the full agent pipeline for one request.
    pub async fn run(
        &self,
        request: &NoveltyCheckRequest,
        expansion: Option<&ExpandedInvention>,
    ) -> ChannelOutcome {
        let queries = self.queries_for_run(request, expansion);

        // Phase 1: acquisition.
        let findings = match self.searcher.search(&queries).await {
            Ok(findings) => findings,
            Err(err) => {
                warn!(channel = %self.channel, error = %err, "Channel search failed");
                return ChannelOutcome::Failed {
                    channel: self.channel,
                    reason: err.failure_reason(),
                    queries_used: queries,
                };
            }
        };

        if findings.is_empty() {
            // Nothing similar surfaced and the search itself worked: a
            // positive novelty signal, though weaker evidence than a close
            // match would be against it.
            info!(channel = %self.channel, "No findings; treating as novelty signal");
            return ChannelOutcome::Success(NoveltyResult {
                channel: self.channel,
                is_novel: true,
                confidence: EMPTY_CHANNEL_CONFIDENCE,
                findings: Vec::new(),
                summary: format!(
                    "No similar {} results found for \"{}\".",
                    self.channel, request.invention_name
                ),
                truth_scores: empty_channel_scores(),
                queries_used: queries,
                created_at: Utc::now(),
            });
        }

        // Phase 2: semantic analysis.
        self.analyze(request, findings, queries).await
    }

    fn queries_for_run(
        &self,
        request: &NoveltyCheckRequest,
        expansion: Option<&ExpandedInvention>,
    ) -> Vec<String> {
        if let Some(expansion) = expansion {
            let queries = expansion.queries_for(self.channel);
            if !queries.is_empty() {
                return queries.to_vec();
            }
        }
        generate_search_queries(
            &request.invention_name,
            &request.description,
            request.problem_statement.as_deref(),
            &request.key_features,
        )
    }

    async fn analyze(
        &self,
        request: &NoveltyCheckRequest,
        findings: Vec<NoveltyFinding>,
        queries: Vec<String>,
    ) -> ChannelOutcome {
        let prompt = analysis_user_prompt(request, &findings);
        let system = analysis_system_prompt(self.channel);

        let completion = match self
            .ai
            .complete(&CompletionRequest::new(prompt).system(system))
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                warn!(channel = %self.channel, error = %err, "Analysis model call failed, returning unscored findings");
                return ChannelOutcome::Success(degraded_result(
                    self.channel,
                    findings,
                    queries,
                ));
            }
        };

        match parse_analysis(&completion.text) {
            Ok(analysis) => {
                ChannelOutcome::Success(apply_analysis(self.channel, findings, queries, analysis))
            }
            Err(err) => {
                warn!(channel = %self.channel, error = %err, "Analysis output unparseable, returning unscored findings");
                ChannelOutcome::Success(degraded_result(self.channel, findings, queries))
            }
        }
    }
}

fn channel_descriptor(channel: Channel) -> &'static str {
    match channel {
        Channel::Web => "general web search results",
        Channel::Retail => "retail product listings",
        Channel::Patent => "patent filings and review proceedings",
    }
}

fn analysis_system_prompt(channel: Channel) -> String {
    format!(
        r#"You are a prior-art analyst reviewing {descriptor} for an invention novelty check.

Rules:
- Score ONLY the findings supplied in the message, identified by index. NEVER invent, merge, or add findings that are not in the input.
- similarity_score measures how close a finding is to the described INVENTION (0 = unrelated, 1 = effectively the same product or mechanism). Judge against the invention, not against the search query.
- is_novel is true only if no finding shows substantial overlap with the invention's core mechanism or purpose.

Respond with ONLY this JSON object:
{{"findings": [{{"index": 0, "similarity_score": 0.0}}], "is_novel": true, "confidence": 0.0, "summary": "one paragraph", "truth_scores": {{"objective_truth": 0.0, "practical_truth": 0.0, "completeness": 0.0, "contextual_scope": 0.0}}}}"#,
        descriptor = channel_descriptor(channel)
    )
}

fn analysis_user_prompt(request: &NoveltyCheckRequest, findings: &[NoveltyFinding]) -> String {
    let mut prompt = format!(
        "Invention: {}\nDescription: {}\n",
        request.invention_name, request.description
    );
    if !request.key_features.is_empty() {
        prompt.push_str(&format!("Features: {}\n", request.key_features.join("; ")));
    }
    prompt.push_str("\nFindings to score:\n");

    for (index, finding) in findings.iter().take(MAX_FINDINGS_FOR_ANALYSIS).enumerate() {
        let mut description = finding.description.clone();
        if description.len() > MAX_DESCRIPTION_CHARS {
            let mut end = MAX_DESCRIPTION_CHARS;
            while !description.is_char_boundary(end) {
                end -= 1;
            }
            description.truncate(end);
        }
        prompt.push_str(&format!("[{index}] {}\n    {description}\n", finding.title));
        if let Some(url) = &finding.url {
            prompt.push_str(&format!("    {url}\n"));
        }
        if finding.metadata.contains_key("challenged") {
            prompt.push_str("    (patent currently under PTAB challenge)\n");
        }
    }

    prompt
}

fn parse_analysis(text: &str) -> Result<AnalysisResponse, ParseError> {
    let analysis: AnalysisResponse = parse_json(text)?;
    if analysis.is_novel.is_none() {
        return Err(ParseError::MissingField("is_novel"));
    }
    if analysis.confidence.is_none() {
        return Err(ParseError::MissingField("confidence"));
    }
    Ok(analysis)
}

fn apply_analysis(
    channel: Channel,
    mut findings: Vec<NoveltyFinding>,
    queries: Vec<String>,
    analysis: AnalysisResponse,
) -> NoveltyResult {
    for score in &analysis.findings {
        if let Some(finding) = findings.get_mut(score.index) {
            finding.similarity_score = Some(score.similarity_score.clamp(0.0, 1.0));
        }
    }
    findings.sort_by(|a, b| {
        b.ranking_score()
            .partial_cmp(&a.ranking_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let truth_scores = match analysis.truth_scores {
        Some(raw) => TruthScores {
            objective_truth: raw.objective_truth,
            practical_truth: raw.practical_truth,
            // Zero completeness is reserved for channel failure; a parsed
            // analysis is by definition not that.
            completeness: raw.completeness.max(0.1),
            contextual_scope: raw.contextual_scope,
        }
        .clamped(),
        None => TruthScores::degraded(),
    };

    let summary = if analysis.summary.trim().is_empty() {
        format!("{} findings analyzed for the {channel} channel.", findings.len())
    } else {
        analysis.summary
    };

    NoveltyResult {
        channel,
        is_novel: analysis.is_novel.unwrap_or(false),
        confidence: analysis.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        findings,
        summary,
        truth_scores,
        queries_used: queries,
        created_at: Utc::now(),
    }
}

/// Result when the search succeeded but scoring did not. Findings stay
/// unscored, truth scores drop but remain nonzero so the channel still
/// counts as completed.
fn degraded_result(
    channel: Channel,
    findings: Vec<NoveltyFinding>,
    queries: Vec<String>,
) -> NoveltyResult {
    let count = findings.len();
    NoveltyResult {
        channel,
        is_novel: true,
        confidence: 0.3,
        findings,
        summary: format!(
            "Semantic analysis was unavailable; returning {count} unscored {channel} findings."
        ),
        truth_scores: TruthScores::degraded(),
        queries_used: queries,
        created_at: Utc::now(),
    }
}

fn empty_channel_scores() -> TruthScores {
    TruthScores {
        objective_truth: 0.6,
        practical_truth: 0.6,
        completeness: 0.7,
        contextual_scope: 0.6,
    }
}
