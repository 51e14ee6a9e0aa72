use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::source::batch_registry::BatchRegistry;
use crate::source::progress_source::BatchProgressSource;
use crate::types::types::{
    BatchCommandAck, BatchId, BatchRun, BatchStatus, ProgressSample, SourceError,
};

/// Body of `GET /api/batch-runs/{id}/progress`.
///
/// The backend falls back to its stored quantity when the PLC cannot be
/// read, which may be null before the first reading.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressPayload {
    target_quantity: f64,
    #[serde(default)]
    current_quantity: Option<f64>,
    status: BatchStatus,
}

/// Error body the backend attaches to non-2xx replies.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

/// REST client for the batch backend. Implements both `BatchProgressSource`
/// and `BatchRegistry` over `{base_url}/api/batch-runs`.
#[derive(Debug, Clone)]
pub struct HttpBatchClient {
    client: Client,
    base: Url,
    base_url: String,
}

impl HttpBatchClient {
    /// Build a client with a tuned connection pool. Only the connect phase is
    /// bounded here; whole-request deadlines belong to the monitor.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| SourceError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl {
                url: base_url,
                reason: "not a base URL".to_string(),
            });
        }
        Ok(Self {
            client,
            base,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/api/batch-runs[/{id}][/{action}]`. Each segment is
    /// percent-encoded, so an id can never reach a different endpoint.
    fn endpoint(&self, batch_id: Option<&BatchId>, action: Option<&str>) -> Result<Url, SourceError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| SourceError::InvalidUrl {
                url: self.base_url.clone(),
                reason: "not a base URL".to_string(),
            })?;
            segments.pop_if_empty().extend(["api", "batch-runs"]);
            if let Some(id) = batch_id {
                segments.push(id.as_str());
            }
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }
}

/// Turn a reply into `T`, mapping 404 and other non-2xx statuses to typed
/// errors. The body is read as text first so decode failures carry serde's
/// message rather than a generic transport error.
async fn decode_response<T: DeserializeOwned>(
    response: Response,
    batch_id: Option<&BatchId>,
) -> Result<T, SourceError> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = batch_id {
            return Err(SourceError::NotFound(id.clone()));
        }
    }

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorPayload>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(SourceError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
}

#[async_trait]
impl BatchProgressSource for HttpBatchClient {
    async fn fetch_progress(&self, batch_id: &BatchId) -> Result<ProgressSample, SourceError> {
        let url = self.endpoint(Some(batch_id), Some("progress"))?;
        log::debug!("[http_client] GET {}", url);

        let response = self.client.get(url).send().await?;
        let payload: ProgressPayload = decode_response(response, Some(batch_id)).await?;

        Ok(ProgressSample {
            batch_id: batch_id.clone(),
            status: payload.status,
            target_quantity: payload.target_quantity,
            current_quantity: payload.current_quantity.unwrap_or(0.0),
        })
    }
}

#[async_trait]
impl BatchRegistry for HttpBatchClient {
    async fn list_batch_runs(&self) -> Result<Vec<BatchRun>, SourceError> {
        let response = self.client.get(self.endpoint(None, None)?).send().await?;
        decode_response(response, None).await
    }

    async fn get_batch_run(&self, batch_id: &BatchId) -> Result<BatchRun, SourceError> {
        let response = self
            .client
            .get(self.endpoint(Some(batch_id), None)?)
            .send()
            .await?;
        decode_response(response, Some(batch_id)).await
    }

    async fn start_batch(&self, batch_id: &BatchId) -> Result<BatchCommandAck, SourceError> {
        log::info!("[http_client] starting batch run {}", batch_id);
        let response = self
            .client
            .post(self.endpoint(Some(batch_id), Some("start"))?)
            .send()
            .await?;
        decode_response(response, Some(batch_id)).await
    }

    async fn stop_batch(&self, batch_id: &BatchId) -> Result<BatchCommandAck, SourceError> {
        log::info!("[http_client] stopping batch run {}", batch_id);
        let response = self
            .client
            .post(self.endpoint(Some(batch_id), Some("stop"))?)
            .send()
            .await?;
        decode_response(response, Some(batch_id)).await
    }
}
