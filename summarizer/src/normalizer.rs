// Node normalization: resolves CURIEs to preferred identifiers and labels

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("node normalizer sent {0}")]
    Status(u16),

    #[error("node normalizer response could not be read: {0}")]
    Decode(#[from] reqwest::Error),
}

/// Result of a POST that reached the network layer. Connection failures and
/// timeouts are an expected outcome, not an error.
pub enum PostOutcome {
    Delivered(reqwest::Response),
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNode {
    pub identifier: String,
    pub label: String,
}

#[derive(Serialize)]
struct NormalizeRequest<'a> {
    curies: &'a [String],
}

#[derive(Deserialize)]
struct NormalizedEntry {
    id: NormalizedId,
}

#[derive(Deserialize)]
struct NormalizedId {
    identifier: String,
    #[serde(default)]
    label: String,
}

#[derive(Clone)]
pub struct NodeNormalizer {
    url: String,
    client: reqwest::Client,
}

impl NodeNormalizer {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    pub async fn post_query<T: Serialize + ?Sized>(
        &self,
        body: &T,
    ) -> Result<PostOutcome, NormalizerError> {
        let response = match self.client.post(&self.url).json(body).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("Request timed out: {}", e);
                return Ok(PostOutcome::Unreachable);
            }
            Err(e) if e.is_connect() || e.is_request() => {
                warn!("Request had connection error: {}", e);
                return Ok(PostOutcome::Unreachable);
            }
            Err(e) => return Err(e.into()),
        };

        if response.status() != reqwest::StatusCode::OK {
            return Err(NormalizerError::Status(response.status().as_u16()));
        }
        Ok(PostOutcome::Delivered(response))
    }

    /// Returns `None` when the service could not be reached. CURIEs the
    /// service does not know are left out of the map.
    pub async fn normalize(
        &self,
        curies: &[String],
    ) -> Result<Option<HashMap<String, NormalizedNode>>, NormalizerError> {
        let response = match self.post_query(&NormalizeRequest { curies }).await? {
            PostOutcome::Delivered(response) => response,
            PostOutcome::Unreachable => return Ok(None),
        };

        let raw: HashMap<String, Value> = response.json().await?;
        let nodes = raw
            .into_iter()
            .filter_map(|(curie, value)| {
                if value.is_null() {
                    return None;
                }
                match serde_json::from_value::<NormalizedEntry>(value) {
                    Ok(entry) => Some((
                        curie,
                        NormalizedNode {
                            identifier: entry.id.identifier,
                            label: entry.id.label,
                        },
                    )),
                    Err(e) => {
                        warn!("Skipping unreadable normalizer entry for {}: {}", curie, e);
                        None
                    }
                }
            })
            .collect();

        Ok(Some(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn normalizer(url: String) -> NodeNormalizer {
        NodeNormalizer::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn known_curies_are_mapped_and_unknown_ones_skipped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/get_normalized_nodes")
            .match_body(Matcher::Json(json!({"curies": ["CHEBI:15365", "FAKE:1"]})))
            .with_status(200)
            .with_body(
                json!({
                    "CHEBI:15365": {"id": {"identifier": "CHEBI:15365", "label": "Aspirin"}},
                    "FAKE:1": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let nodes = normalizer(format!("{}/get_normalized_nodes", server.url()))
            .normalize(&["CHEBI:15365".to_string(), "FAKE:1".to_string()])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes["CHEBI:15365"].label, "Aspirin");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_label_becomes_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"MONDO:1": {"id": {"identifier": "MONDO:1"}}}"#)
            .create_async()
            .await;

        let nodes = normalizer(server.url())
            .normalize(&["MONDO:1".to_string()])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(nodes["MONDO:1"].label, "");
    }

    #[tokio::test]
    async fn non_200_status_is_a_hard_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(502)
            .create_async()
            .await;

        let err = normalizer(server.url())
            .normalize(&["MONDO:1".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, NormalizerError::Status(502)));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_sentinel_not_an_error() {
        // Nothing listens on the discard port.
        let result = normalizer("http://127.0.0.1:9/".to_string())
            .normalize(&["MONDO:1".to_string()])
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
