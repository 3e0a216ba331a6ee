use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::agents::SummarizerAgent;
use crate::edge::Edge;
use crate::error;
use crate::metrics::Metrics;
use crate::middleware::{self, CorsPolicy};

mod summarize;

const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<SummarizerAgent>,
    pub metrics: Arc<Metrics>,
    pub example_edge: Arc<Edge>,
}

/// Full HTTP surface: summarization endpoints, health, metrics, CORS
/// preflight, and error recovery.
pub fn routes(
    state: AppState,
    cors: Arc<CorsPolicy>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    let abstract_route = warp::path!("summarize" / "abstract")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(summarize::handle_summarize_abstract);

    let edge_route = warp::path!("summarize" / "edge")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(summarize::handle_summarize_edge);

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| metrics_reply(&state.metrics));

    let preflight = warp::path!("summarize" / String)
        .and(warp::options())
        .and(warp::header::optional::<String>("access-control-request-headers"))
        .map(|_endpoint: String, requested: Option<String>| middleware::preflight(requested));

    abstract_route
        .or(edge_route)
        .or(health)
        .or(metrics_route)
        .or(preflight)
        .recover(error::handle_rejection)
        .and(warp::header::optional::<String>("origin"))
        .map(move |reply, origin: Option<String>| cors.decorate(reply, origin))
}

fn metrics_reply(metrics: &Metrics) -> warp::reply::Response {
    match metrics.encode() {
        Ok((buffer, content_type)) => {
            warp::reply::with_header(buffer, "Content-Type", content_type).into_response()
        }
        Err(e) => warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
