use tracing::{info, Instrument};
use uuid::Uuid;
use warp::{Rejection, Reply};

use crate::api::AppState;
use crate::edge::Edge;
use crate::error::ApiError;
use crate::models::{AbstractItem, EdgeItem};
use crate::prompts;

pub async fn handle_summarize_abstract(
    item: AbstractItem,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("summarize_abstract", %request_id);

    async move {
        if item.abstract_text.trim().is_empty() {
            return Err(warp::reject::custom(ApiError::BadRequest(
                "abstract must not be empty".to_string(),
            )));
        }

        let llm = item.parameters.llm();
        let summary = state
            .summarizer
            .summarize_abstract(&item.abstract_text, &llm)
            .await
            .map_err(ApiError::from)?;

        state.metrics.summaries.with_label_values(&["abstract"]).inc();
        info!("Abstract summary: {}", summary);
        Ok::<_, Rejection>(warp::reply::json(&summary))
    }
    .instrument(span)
    .await
}

pub async fn handle_summarize_edge(item: EdgeItem, state: AppState) -> Result<impl Reply, Rejection> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("summarize_edge", %request_id);

    async move {
        let (edge, mut summary) = match Edge::from_request_value(item.edge).map_err(ApiError::from)? {
            Some(edge) => (edge, String::new()),
            None => {
                info!("No edge passed - loading example");
                (Edge::clone(&state.example_edge), prompts::example_banner())
            }
        };

        summary += &state.summarizer.summarize_edge(edge, &item.parameters).await?;

        info!("Edge Summary: {}", summary);
        Ok::<_, Rejection>(warp::reply::json(&summary))
    }
    .instrument(span)
    .await
}
