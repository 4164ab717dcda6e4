//! Backend client seam and the HTTP implementation.
//!
//! The backend owns token storage, encryption, and the actual code
//! exchange; this crate only talks to it. The `BackendClient` trait is the
//! injection point that keeps the connection manager deterministic under
//! test — integration tests implement it directly instead of mocking HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::Provider;

/// Failure talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Authoritative connection status for one provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionStatusDto {
    pub provider: Provider,
    pub connected: bool,
    /// One of "connected", "expired", "error", "disconnected".
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to an authorization-start request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthDto {
    pub provider: Provider,
    pub auth_url: String,
    pub state: String,
}

/// Wrapper the backend uses for single-connection responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionEnvelopeDto {
    pub connection: ConnectionStatusDto,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CapabilityDto {
    pub accessible: bool,
}

/// Response to a health-check request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub provider: Provider,
    pub calendar: CapabilityDto,
    pub email: CapabilityDto,
    pub last_checked: DateTime<Utc>,
}

#[derive(Serialize)]
struct StartAuthRequest<'a> {
    provider: Provider,
    state: &'a str,
}

#[derive(Serialize)]
struct CompleteAuthRequest<'a> {
    provider: Provider,
    code: &'a str,
    state: &'a str,
}

/// Operations the backend exposes for connection management.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// GET /connections
    async fn list_connections(&self) -> Result<Vec<ConnectionStatusDto>, BackendError>;

    /// POST /connections/oauth/start
    async fn start_oauth(
        &self,
        provider: Provider,
        state: &str,
    ) -> Result<StartAuthDto, BackendError>;

    /// POST /connections/oauth/callback — exchanges the code for tokens.
    async fn complete_oauth(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<ConnectionStatusDto, BackendError>;

    /// DELETE /connections/{provider} — revokes and deletes the grant.
    async fn disconnect(&self, provider: Provider) -> Result<(), BackendError>;

    /// POST /connections/{provider}/reconnect
    async fn reconnect(&self, provider: Provider) -> Result<ConnectionStatusDto, BackendError>;

    /// POST /connections/{provider}/refresh — backend-side token refresh.
    async fn refresh(&self, provider: Provider) -> Result<ConnectionStatusDto, BackendError>;

    /// POST /connections/{provider}/health-check
    async fn health_check(&self, provider: Provider) -> Result<HealthDto, BackendError>;
}

/// reqwest-backed implementation of [`BackendClient`].
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// # Arguments
    /// * `base_url` - Backend base URL, no trailing slash (e.g. "https://api.example.com")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Surface non-2xx responses as `BackendError::Status` with the body
    /// preserved for diagnostics.
    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(BackendError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn list_connections(&self) -> Result<Vec<ConnectionStatusDto>, BackendError> {
        let response = self.client.get(self.url("/connections")).send().await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    async fn start_oauth(
        &self,
        provider: Provider,
        state: &str,
    ) -> Result<StartAuthDto, BackendError> {
        tracing::debug!(provider = %provider, "requesting authorization url");
        let response = self
            .client
            .post(self.url("/connections/oauth/start"))
            .json(&StartAuthRequest { provider, state })
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    async fn complete_oauth(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<ConnectionStatusDto, BackendError> {
        tracing::debug!(provider = %provider, "exchanging authorization code");
        let response = self
            .client
            .post(self.url("/connections/oauth/callback"))
            .json(&CompleteAuthRequest { provider, code, state })
            .send()
            .await?;
        let envelope: ConnectionEnvelopeDto = Self::checked(response).await?.json().await?;
        Ok(envelope.connection)
    }

    async fn disconnect(&self, provider: Provider) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.url(&format!("/connections/{}", provider)))
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn reconnect(&self, provider: Provider) -> Result<ConnectionStatusDto, BackendError> {
        let response = self
            .client
            .post(self.url(&format!("/connections/{}/reconnect", provider)))
            .send()
            .await?;
        let envelope: ConnectionEnvelopeDto = Self::checked(response).await?.json().await?;
        Ok(envelope.connection)
    }

    async fn refresh(&self, provider: Provider) -> Result<ConnectionStatusDto, BackendError> {
        tracing::debug!(provider = %provider, "requesting token refresh");
        let response = self
            .client
            .post(self.url(&format!("/connections/{}/refresh", provider)))
            .send()
            .await?;
        let envelope: ConnectionEnvelopeDto = Self::checked(response).await?.json().await?;
        Ok(envelope.connection)
    }

    async fn health_check(&self, provider: Provider) -> Result<HealthDto, BackendError> {
        let response = self
            .client
            .post(self.url(&format!("/connections/{}/health-check", provider)))
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }
}
