use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::CompletionGateway;
use priorscan_common::{Config, NoveltyCheckRequest};
use priorscan_engine::{
    InMemoryStore, NoveltyChecker, RunContext, SearchAgent,
};
use priorscan_search::{
    PatentSearchClient, RetailSearchClient, SearchCache, WebSearchClient,
};

/// Check whether an invention idea already exists across web, retail, and
/// patent sources.
#[derive(Parser, Debug)]
#[command(name = "priorscan", version)]
struct Args {
    /// Invention name
    #[arg(long)]
    name: String,

    /// Free-text description of the invention
    #[arg(long)]
    description: String,

    /// Problem the invention solves
    #[arg(long)]
    problem: Option<String>,

    /// Intended audience
    #[arg(long)]
    audience: Option<String>,

    /// Key feature (repeatable)
    #[arg(long = "feature")]
    features: Vec<String>,

    /// User identity recorded with the optional memory log entry
    #[arg(long, default_value = "cli")]
    user: String,

    /// Project id; when set, the result is appended to the memory log
    #[arg(long)]
    project: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("priorscan=info".parse()?))
        .init();

    let args = Args::parse();

    info!("PriorScan starting...");

    let config = Config::from_env();
    config.log_redacted();

    let cache = Arc::new(SearchCache::new());
    let gateway = Arc::new(CompletionGateway::new(
        config.anthropic_api_key.as_deref(),
        config.openrouter_api_key.as_deref(),
    ));

    let web = SearchAgent::new(
        Arc::new(WebSearchClient::new(
            config.serper_api_key.clone(),
            cache.clone(),
        )),
        gateway.clone(),
    );
    let retail = SearchAgent::new(
        Arc::new(RetailSearchClient::new(
            config.serper_api_key.clone(),
            cache.clone(),
        )),
        gateway.clone(),
    );
    let patent = SearchAgent::new(
        Arc::new(PatentSearchClient::new(
            config.patentsview_api_key.clone(),
            cache.clone(),
        )),
        gateway.clone(),
    );

    let memory = Arc::new(InMemoryStore::new());
    let checker = NoveltyChecker::new(gateway, web, retail, patent)
        .with_memory(memory.clone());

    let request = NoveltyCheckRequest {
        invention_name: args.name,
        description: args.description,
        problem_statement: args.problem,
        target_audience: args.audience,
        key_features: args.features,
    };
    let context = RunContext {
        user_id: args.user,
        project_id: args.project,
    };

    let response = checker
        .run_novelty_check(&request, None, Some(&context))
        .await?;

    println!("\n=== Novelty Check: {} ===", request.invention_name);
    println!("Risk level:    {}", response.risk_level);
    println!("Novelty score: {:.2}", response.overall_novelty_score);
    println!();

    for result in response.results() {
        println!(
            "[{}] novel={} confidence={:.2} findings={}",
            result.channel,
            result.is_novel,
            result.confidence,
            result.findings.len()
        );
        println!("    {}", result.summary);
        for finding in result.findings.iter().take(3) {
            println!(
                "    - ({:.2}) {}{}",
                finding.ranking_score(),
                finding.title,
                finding
                    .url
                    .as_deref()
                    .map(|u| format!(" <{u}>"))
                    .unwrap_or_default()
            );
        }
    }

    println!("\nRecommendation: {}", response.recommendation);
    println!("Next steps:");
    for step in &response.next_steps {
        println!("  - {step}");
    }

    if let Some(record) = memory.records().last() {
        info!(importance = record.importance, "Memory log entry recorded");
    }

    Ok(())
}
