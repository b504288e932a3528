//! Public-key fetcher backed by the identity service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use tiergate_common::auth::{AuthError, AuthResult, KeyFetcher};
use tiergate_domain::constants::PUBLIC_KEY_ENDPOINT;
use tiergate_domain::{IdentityServiceConfig, Result};
use tracing::{debug, instrument};
use url::Url;

use super::endpoint_url;
use super::types::PublicKeyResponse;
use crate::http::HttpClient;

/// Fetches the verification key with `GET /api/auth/public-key`
///
/// Uses its own client so the key fetch timeout is independent of the
/// validate call's.
#[derive(Debug, Clone)]
pub struct RemoteKeyFetcher {
    http: HttpClient,
    url: Url,
}

impl RemoteKeyFetcher {
    /// Build a fetcher from the identity service settings.
    ///
    /// # Errors
    /// Returns `TiergateError::Config` for a bad base URL
    pub fn new(config: &IdentityServiceConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.key_fetch_timeout_seconds))
            .max_attempts(config.max_attempts)
            .build()?;
        Self::with_client(http, &config.base_url)
    }

    /// Build a fetcher over an existing client.
    ///
    /// # Errors
    /// Returns `TiergateError::Config` for a bad base URL
    pub fn with_client(http: HttpClient, base_url: &str) -> Result<Self> {
        Ok(Self { http, url: endpoint_url(base_url, PUBLIC_KEY_ENDPOINT)? })
    }

    /// Endpoint this fetcher calls.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl KeyFetcher for RemoteKeyFetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_public_key(&self) -> AuthResult<String> {
        let request =
            self.http.request(Method::GET, self.url.clone()).header(ACCEPT, "application/json");
        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| AuthError::KeyFetch(format!("API request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::KeyFetch(format!(
                "API returned status {}: {body}",
                status.as_u16()
            )));
        }

        let payload: PublicKeyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(format!("failed to parse response: {e}")))?;
        if payload.public_key.is_empty() {
            return Err(AuthError::KeyFetch("API returned empty public key".into()));
        }

        debug!("Fetched public key from identity service");
        Ok(payload.public_key)
    }
}
