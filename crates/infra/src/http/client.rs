//! Retrying HTTP client for the identity service
//!
//! Transport failures and 5xx answers are retried with exponential backoff
//! up to `max_attempts`; everything else is returned to the caller as-is.

use std::time::Duration;

use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response};
use tiergate_domain::{IdentityServiceConfig, Result, TiergateError};
use tracing::debug;

use crate::errors::InfraError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF_SHIFT: u32 = 8;

/// HTTP client with a per-client timeout and retry policy
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client for the validate endpoint of the identity service.
    ///
    /// # Errors
    /// Returns `TiergateError::Network` if the TLS backend cannot initialise
    pub fn for_identity_service(config: &IdentityServiceConfig) -> Result<Self> {
        Self::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .max_attempts(config.max_attempts)
            .build()
    }

    /// Start a request on the underlying client.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Per-request timeout configured on this client.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `builder`, retrying transport failures and server errors.
    ///
    /// The body must be clonable (buffered) so it can be replayed.
    ///
    /// # Errors
    /// Returns the mapped transport error of the last attempt. Non-success
    /// statuses are not errors; the final response is returned.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| TiergateError::Internal("request body cannot be replayed".into()))?
                .build()
                .map_err(|err| TiergateError::from(InfraError::from(err)))?;
            let method = request.method().clone();
            let url = request.url().clone();
            let last_attempt = attempt >= attempts;

            debug!(attempt, %method, %url, "Sending HTTP request");
            match self.client.execute(request).await {
                Ok(response) if response.status().is_server_error() && !last_attempt => {
                    debug!(attempt, status = %response.status(), "Server error, retrying");
                }
                Ok(response) => {
                    debug!(attempt, %method, %url, status = %response.status(), "HTTP response");
                    return Ok(response);
                }
                Err(err) if should_retry(&err) && !last_attempt => {
                    debug!(attempt, error = %err, "HTTP request failed, retrying");
                }
                Err(err) => return Err(InfraError::from(err).into()),
            }

            let delay = self.backoff_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    fn backoff_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_backoff.saturating_mul(1 << shift)
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts, initial try included. Zero is treated as one.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub const fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns `TiergateError::Network` if reqwest cannot build the client
    pub fn build(self) -> Result<HttpClient> {
        let agent = self
            .user_agent
            .unwrap_or_else(|| format!("tiergate/{}", env!("CARGO_PKG_VERSION")));
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(agent)
            .no_proxy()
            .build()
            .map_err(|err| TiergateError::from(InfraError::from(err)))?;

        Ok(HttpClient {
            client,
            timeout: self.timeout,
            max_attempts: self.max_attempts,
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
