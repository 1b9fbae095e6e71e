//! REST client for the generation backend.
//!
//! Wraps job submission, job status lookup, the model catalog and the
//! credit balance endpoint using [`reqwest`]. [`GenerationApi`] implements
//! the engine's [`GenerationBackend`] and [`CreditLedger`] traits.

use std::time::Duration;

use async_trait::async_trait;
use canvasgen_core::backend::{CreditLedger, GenerationBackend};
use canvasgen_core::catalog::{AiModel, ModelKind};
use canvasgen_core::error::CoreError;
use canvasgen_core::job::{JobUpdate, SubmitAck, SubmitRequest};
use serde::Deserialize;

/// Per-request deadline of the default client. Shorter than the server's
/// own request timeout so a stuck backend surfaces as an upstream error.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for one generation backend.
pub struct GenerationApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<AiModel>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u32,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl From<ProviderApiError> for CoreError {
    fn from(err: ProviderApiError) -> Self {
        CoreError::Upstream(err.to_string())
    }
}

impl GenerationApi {
    /// * `base_url` - HTTP base URL, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderApiError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/generate`.
    pub async fn submit_job(&self, request: &SubmitRequest) -> Result<SubmitAck, ProviderApiError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /api/generations/{node_id}`. A 404 means the backend has no job
    /// for the node.
    pub async fn get_job(&self, node_id: &str) -> Result<Option<JobUpdate>, ProviderApiError> {
        let response = self
            .client
            .get(format!("{}/api/generations/{}", self.base_url, node_id))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    /// `GET /api/models[?type=...]`.
    pub async fn list_models(
        &self,
        kind: Option<ModelKind>,
    ) -> Result<Vec<AiModel>, ProviderApiError> {
        let mut request = self.client.get(format!("{}/api/models", self.base_url));
        if let Some(kind) = kind {
            request = request.query(&[("type", kind.as_str())]);
        }
        let response = request.send().await?;
        let body: ModelsResponse = Self::parse_response(response).await?;
        Ok(body.models)
    }

    /// `GET /api/credits/balance`.
    pub async fn get_balance(&self) -> Result<u32, ProviderApiError> {
        let response = self
            .client
            .get(format!("{}/api/credits/balance", self.base_url))
            .send()
            .await?;
        let body: BalanceResponse = Self::parse_response(response).await?;
        Ok(body.balance)
    }

    // ---- private helpers ----

    /// Turn a non-2xx response into [`ProviderApiError::ApiError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Check the status, then decode the JSON body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerationBackend for GenerationApi {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, CoreError> {
        Ok(self.submit_job(request).await?)
    }

    async fn job_status(&self, node_id: &str) -> Result<Option<JobUpdate>, CoreError> {
        Ok(self.get_job(node_id).await?)
    }
}

#[async_trait]
impl CreditLedger for GenerationApi {
    async fn balance(&self) -> Result<u32, CoreError> {
        Ok(self.get_balance().await?)
    }
}
