use std::convert::Infallible;

use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::{reject::Reject, Rejection, Reply};

use crate::edge::EdgeError;
use crate::llm::GenerationError;
use crate::normalizer::NormalizerError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid edge: {0}")]
    InvalidEdge(#[from] EdgeError),

    #[error("Generation error: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("Node normalizer error: {0}")]
    NormalizerError(#[from] NormalizerError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidEdge(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for ApiError {}

fn error_reply(code: StatusCode, message: &str, details: String) -> warp::reply::Response {
    let json = warp::reply::json(&serde_json::json!({
        "error": message,
        "details": details,
    }));
    warp::reply::with_status(json, code).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(api_err) = err.find::<ApiError>() {
        let code = api_err.status();
        if code.is_server_error() {
            error!("Request failed: {}", api_err);
        }
        let message = code.canonical_reason().unwrap_or("Error");
        return Ok(error_reply(code, message, api_err.to_string()));
    }

    if err.is_not_found() {
        return Ok(error_reply(
            StatusCode::NOT_FOUND,
            "Resource not found",
            String::new(),
        ));
    }

    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Bad request",
            e.to_string(),
        ));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large",
            String::new(),
        ));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            String::new(),
        ));
    }

    error!("Unhandled rejection: {:?}", err);
    Ok(error_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        String::new(),
    ))
}
