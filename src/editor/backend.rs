//! Remote calls the editor depends on
//!
//! `CanvasBackend` is the seam between the editing controller and the canvas
//! service. `HttpCanvasBackend` talks to the axum API in this crate; tests
//! substitute an in-memory implementation.

use crate::api::ErrorBody;
use crate::error::{LoadError, SaveError, ValidationError};
use crate::graph::{CanvasSnapshot, SavedCanvas};
use crate::sync::HealthSyncStatus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

#[async_trait]
pub trait CanvasBackend: Send + Sync {
    /// `GET /canvas/{process_id}`
    async fn fetch_canvas(&self, process_id: &str) -> Result<CanvasSnapshot, LoadError>;

    /// `PUT /canvas/{process_id}` with the full desired graph
    async fn save_canvas(
        &self,
        process_id: &str,
        payload: &CanvasSnapshot,
    ) -> Result<SavedCanvas, SaveError>;

    /// `GET /health/get_sync_status?process_id=`
    async fn fetch_sync_status(&self, process_id: &str) -> Result<HealthSyncStatus>;
}

/// `CanvasBackend` over HTTP
#[derive(Debug, Clone)]
pub struct HttpCanvasBackend {
    /// Service root; request paths are appended as segments
    base_url: Url,
    client: Client,
}

impl HttpCanvasBackend {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .with_context(|| format!("Invalid canvas service URL '{}'", base_url.as_ref()))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Canvas service URL '{}' cannot take a path", base_url);
        }
        Ok(Self { base_url, client })
    }

    /// `base_url` plus percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn canvas_url(&self, process_id: &str) -> Url {
        self.endpoint(&["canvas", process_id])
    }
}

#[async_trait]
impl CanvasBackend for HttpCanvasBackend {
    async fn fetch_canvas(&self, process_id: &str) -> Result<CanvasSnapshot, LoadError> {
        tracing::debug!("🌐 GET canvas '{}'", process_id);

        let response = self
            .client
            .get(self.canvas_url(process_id))
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LoadError::NotFound(process_id.to_string())),
            status if status.is_success() => response
                .json::<CanvasSnapshot>()
                .await
                .map_err(|e| LoadError::Decode(e.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LoadError::Transport(format!("HTTP {}: {}", status, body)))
            }
        }
    }

    async fn save_canvas(
        &self,
        process_id: &str,
        payload: &CanvasSnapshot,
    ) -> Result<SavedCanvas, SaveError> {
        tracing::debug!(
            "🌐 PUT canvas '{}' ({} nodes, {} edges)",
            process_id,
            payload.node_count(),
            payload.edge_count()
        );

        let response = self
            .client
            .put(self.canvas_url(process_id))
            .json(payload)
            .send()
            .await
            .map_err(|e| SaveError::Primary(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<SavedCanvas>()
                .await
                .map_err(|e| SaveError::Primary(format!("invalid save response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
        match (status, body) {
            (StatusCode::UNPROCESSABLE_ENTITY, Some(body)) => {
                Err(SaveError::Validation(ValidationError {
                    violations: body.violations,
                }))
            }
            (StatusCode::CONFLICT, body) => Err(SaveError::StaleWrite {
                expected: payload.revision,
                actual: body.and_then(|b| b.current_revision),
            }),
            (status, Some(body)) => Err(SaveError::Primary(format!("HTTP {}: {}", status, body.error))),
            (status, None) => Err(SaveError::Primary(format!("HTTP {}: {}", status, text))),
        }
    }

    async fn fetch_sync_status(&self, process_id: &str) -> Result<HealthSyncStatus> {
        let url = self.endpoint(&["health", "get_sync_status"]);
        let status = self
            .client
            .get(url)
            .query(&[("process_id", process_id)])
            .send()
            .await
            .context("Failed to request sync status")?
            .error_for_status()
            .context("Sync status request was rejected")?
            .json::<HealthSyncStatus>()
            .await
            .context("Failed to decode sync status")?;
        Ok(status)
    }
}
