//! AI query expansion with a deterministic fallback.
//!
//! Patent search in particular performs far better on functional and
//! mechanism vocabulary than on brand-style phrasing, so the model is told
//! to rewrite colloquial descriptions ("doesn't leak") into technical form
//! ("leak-proof, spill-resistant construction"). If the model or its JSON
//! is unusable the pipeline still proceeds on extractor-derived queries.

use std::sync::Arc;

use ai_client::CompletionRequest;
use priorscan_common::keywords::generate_search_queries;
use priorscan_common::{ExpandedInvention, NoveltyCheckRequest};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model_output::{parse_json, ParseError};
use crate::CompletionBackend;

const EXPANSION_SYSTEM_PROMPT: &str = r#"You are an invention analyst preparing prior-art search queries.

Given a product idea, produce a JSON object with exactly these fields:

- "expanded_description": the idea restated in technical, functional language. Convert colloquial claims into mechanism vocabulary (e.g. "doesn't leak" becomes "leak-proof, spill-resistant construction"); patent indexes match on function, not marketing copy.
- "key_features": up to 5 short feature phrases.
- "product_category": one short category label.
- "differentiators": up to 5 phrases naming what sets this idea apart.
- "web_queries": up to 5 web search queries for finding similar products or articles.
- "retail_queries": up to 5 marketplace search queries a shopper would type.
- "patent_queries": up to 5 queries in patent-claim vocabulary (mechanisms, materials, functions).

Return ONLY the JSON object, no commentary."#;

/// Model output shape before validation. Everything optional so validation,
/// not deserialization, decides what is missing.
#[derive(Debug, Deserialize)]
struct RawExpansion {
    expanded_description: Option<String>,
    key_features: Option<Vec<String>>,
    product_category: Option<String>,
    differentiators: Option<Vec<String>>,
    web_queries: Option<Vec<String>>,
    retail_queries: Option<Vec<String>>,
    patent_queries: Option<Vec<String>>,
}

fn validate(raw: RawExpansion) -> Result<ExpandedInvention, ParseError> {
    let expanded_description = raw
        .expanded_description
        .filter(|d| !d.trim().is_empty())
        .ok_or(ParseError::MissingField("expanded_description"))?;
    let key_features = raw
        .key_features
        .filter(|f| !f.is_empty())
        .ok_or(ParseError::MissingField("key_features"))?;
    let web_queries = raw
        .web_queries
        .filter(|q| !q.is_empty())
        .ok_or(ParseError::MissingField("web_queries"))?;

    Ok(ExpandedInvention {
        expanded_description,
        key_features,
        product_category: raw.product_category.unwrap_or_default(),
        differentiators: raw.differentiators.unwrap_or_default(),
        web_queries,
        retail_queries: raw.retail_queries.unwrap_or_default(),
        patent_queries: raw.patent_queries.unwrap_or_default(),
    }
    .truncate_to_caps())
}

pub struct InventionExpander {
    ai: Arc<dyn CompletionBackend>,
}

impl InventionExpander {
    pub fn new(ai: Arc<dyn CompletionBackend>) -> Self {
        Self { ai }
    }

    /// Expand a request into an enriched search profile. Never fails: any
    /// model or parse problem degrades to the deterministic expansion.
    pub async fn expand(&self, request: &NoveltyCheckRequest) -> ExpandedInvention {
        let prompt = Self::user_prompt(request);

        let completion = match self
            .ai
            .complete(
                &CompletionRequest::new(prompt)
                    .system(EXPANSION_SYSTEM_PROMPT)
                    .temperature(0.2),
            )
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                warn!(error = %err, "Expansion model call failed, using deterministic expansion");
                return Self::fallback_expansion(request);
            }
        };

        match parse_json::<RawExpansion>(&completion.text).and_then(validate) {
            Ok(expanded) => {
                info!(
                    provider = %completion.provider,
                    web_queries = expanded.web_queries.len(),
                    patent_queries = expanded.patent_queries.len(),
                    "Invention expanded"
                );
                expanded
            }
            Err(err) => {
                warn!(error = %err, "Expansion output rejected, using deterministic expansion");
                Self::fallback_expansion(request)
            }
        }
    }

    fn user_prompt(request: &NoveltyCheckRequest) -> String {
        let mut prompt = format!(
            "Invention: {}\n\nDescription: {}",
            request.invention_name, request.description
        );
        if let Some(problem) = &request.problem_statement {
            prompt.push_str(&format!("\n\nProblem it solves: {problem}"));
        }
        if let Some(audience) = &request.target_audience {
            prompt.push_str(&format!("\n\nTarget audience: {audience}"));
        }
        if !request.key_features.is_empty() {
            prompt.push_str(&format!(
                "\n\nStated features:\n- {}",
                request.key_features.join("\n- ")
            ));
        }
        prompt
    }

    /// Cheap, deterministic expansion from extractor output plus the raw
    /// request fields. Identical inputs produce identical queries, which
    /// is what keeps cache keys stable when the model is unavailable.
    pub fn fallback_expansion(request: &NoveltyCheckRequest) -> ExpandedInvention {
        let queries = generate_search_queries(
            &request.invention_name,
            &request.description,
            request.problem_statement.as_deref(),
            &request.key_features,
        );

        ExpandedInvention {
            expanded_description: request.description.clone(),
            key_features: request.key_features.clone(),
            product_category: String::new(),
            differentiators: Vec::new(),
            web_queries: queries.clone(),
            retail_queries: queries.clone(),
            patent_queries: queries,
        }
        .truncate_to_caps()
    }
}
