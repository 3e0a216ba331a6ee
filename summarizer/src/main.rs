use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use warp::Filter;

mod agents;
mod api;
mod config;
mod edge;
mod error;
mod llm;
mod metrics;
mod middleware;
mod models;
mod normalizer;
mod prompts;
mod telemetry;
mod transcript;

use agents::{RetrieverAgent, RetryPolicy, SummarizerAgent};
use edge::Edge;
use llm::OpenAiClient;
use middleware::CorsPolicy;
use normalizer::NodeNormalizer;
use transcript::Transcript;

const EXAMPLE_EDGE: &str = include_str!("../data/example_edge.json");
const NORMALIZER_TIMEOUT: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing; the guard flushes the log file on exit
    let _log_guard = telemetry::init(&config.log)?;

    info!("Starting Knowledge Graph Summarizer v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(metrics::Metrics::new().context("failed to register metrics")?);

    let retriever = RetrieverAgent::new(
        config.pubmed_efetch_url.clone(),
        config.pubmed_cache_dir(),
        RetryPolicy::new(config.pubmed_max_retries),
        config.pubmed_timeout,
        metrics.clone(),
    )?;
    info!(
        "PubMed abstracts cached under {}",
        config.pubmed_cache_dir().display()
    );

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; summarization requests will fail");
    }
    let llm = OpenAiClient::new(
        &config.llm_base_url,
        config.openai_api_key.clone(),
        config.llm_timeout,
    )?;

    let mut summarizer = SummarizerAgent::new(
        Arc::new(llm),
        retriever,
        Transcript::new(config.transcript_path.clone()),
        metrics.clone(),
    );
    if config.resolve_node_labels {
        let normalizer =
            NodeNormalizer::new(config.node_normalizer_url.clone(), NORMALIZER_TIMEOUT)?;
        summarizer = summarizer.with_normalizer(normalizer);
        info!("Node label resolution enabled via {}", config.node_normalizer_url);
    }

    let example_edge: Edge =
        serde_json::from_str(EXAMPLE_EDGE).context("bundled example edge is invalid")?;

    let cors = CorsPolicy::new(&config.cors_origin_pattern, config.dev_mode)
        .context("CORS_ORIGIN_PATTERN is not a valid regex")?;

    let state = api::AppState {
        summarizer: Arc::new(summarizer),
        metrics,
        example_edge: Arc::new(example_edge),
    };

    // Build API routes
    let routes = api::routes(state, Arc::new(cors)).with(warp::log("api"));

    // Start server
    let addr = ([0, 0, 0, 0], config.port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes).run(addr).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_example_edge_is_valid() {
        let edge: Edge = serde_json::from_str(EXAMPLE_EDGE).unwrap();
        assert_eq!(
            edge.format_sentence(),
            "imatinib treats chronic myelogenous leukemia"
        );
        assert!(edge.has_evidence());
    }
}
