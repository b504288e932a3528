//! Tier-1 validator: the identity service, with local fallback
//!
//! Order of answers:
//! 1. Service reachable and `valid=true`: claims are read locally.
//! 2. Service reachable and `valid=false`: rejected, no fallback.
//! 3. Service unreachable, non-200, or unparseable: the local validator
//!    decides. If it also fails the error records both reasons.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tiergate_common::auth::codec::decode_claims_unverified;
use tiergate_common::auth::{
    parse_public_key_pem, AuthError, AuthResult, LocalValidator, TokenValidator, ValidationOutcome,
};
use tiergate_domain::constants::VALIDATE_ENDPOINT;
use tiergate_domain::{AccessTokenClaims, RefreshTokenClaims, Result};
use tracing::{debug, instrument, warn};
use url::Url;

use super::endpoint_url;
use super::types::{ValidateRequest, ValidateResponse};
use crate::http::HttpClient;

/// Validates tokens against `POST /api/auth/validate`
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    http: HttpClient,
    url: Url,
    local: Arc<LocalValidator>,
}

impl RemoteValidator {
    /// Create a validator calling `base_url` and falling back to `local`.
    ///
    /// # Errors
    /// Returns `TiergateError::Config` for a bad base URL
    pub fn new(http: HttpClient, base_url: &str, local: Arc<LocalValidator>) -> Result<Self> {
        Ok(Self { http, url: endpoint_url(base_url, VALIDATE_ENDPOINT)?, local })
    }

    /// The fallback validator.
    #[must_use]
    pub fn local(&self) -> &LocalValidator {
        &self.local
    }

    /// Drop the cached verification key.
    ///
    /// # Errors
    /// Returns the invalidation hook's failure
    pub async fn invalidate_cache(&self) -> AuthResult<()> {
        self.local.cache().invalidate().await
    }

    /// Ask the service about `token`. `Err` carries why the service could not
    /// answer and means "fall back".
    #[instrument(skip_all, fields(url = %self.url))]
    async fn ask_service(&self, token: &str) -> std::result::Result<ValidateResponse, String> {
        let request = self
            .http
            .request(Method::POST, self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&ValidateRequest { token: token.to_string() });

        let response =
            self.http.send(request).await.map_err(|e| format!("API request failed: {e}"))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| format!("failed to read response: {e}"))?;
        if status != StatusCode::OK {
            return Err(format!("API returned status {}: {body}", status.as_u16()));
        }

        serde_json::from_str(&body).map_err(|e| format!("failed to parse response: {e}"))
    }

    /// Swap in a key the service pushed with its answer.
    ///
    /// The PEM is only checked here; the cache is cleared so the next local
    /// validation refetches through the key fetcher.
    async fn accept_public_key(&self, pem: &str) {
        if let Err(e) = parse_public_key_pem(pem) {
            warn!(error = %e, "Identity service sent an unusable public key");
            return;
        }
        if let Err(e) = self.invalidate_cache().await {
            warn!(error = %e, "Failed to invalidate key cache after key push");
        }
    }

    async fn take_pushed_key(&self, response: &ValidateResponse) {
        if let Some(pem) = response.public_key.as_deref().filter(|pem| !pem.is_empty()) {
            self.accept_public_key(pem).await;
        }
    }

    /// Claims of a token the service already vouched for. Local
    /// verification is preferred; if the key is unavailable the payload is
    /// read without verification.
    async fn vouched_claims<T, F>(&self, token: &str, local: F) -> AuthResult<T>
    where
        T: DeserializeOwned,
        F: std::future::Future<Output = AuthResult<T>> + Send,
    {
        match local.await {
            Ok(claims) => Ok(claims),
            Err(e) if e.is_transport() => {
                debug!(error = %e, "Key unavailable, reading service-approved claims");
                decode_claims_unverified(token)
            }
            Err(e) => Err(e),
        }
    }
}

fn exhausted(remote: String, local: AuthError) -> AuthError {
    AuthError::FallbackExhausted { remote, local: Box::new(local) }
}

#[async_trait]
impl TokenValidator for RemoteValidator {
    async fn validate_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        match self.ask_service(token).await {
            Err(reason) => {
                debug!(%reason, "Identity service unavailable, validating locally");
                self.local.validate_access_token(token).await.map_err(|e| exhausted(reason, e))
            }
            Ok(response) if !response.valid => Err(AuthError::RemoteRejected(response.message)),
            Ok(response) => {
                self.take_pushed_key(&response).await;
                self.vouched_claims(token, self.local.validate_access_token(token)).await
            }
        }
    }

    async fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        match self.ask_service(token).await {
            Err(reason) => {
                debug!(%reason, "Identity service unavailable, validating locally");
                self.local.validate_refresh_token(token).await.map_err(|e| exhausted(reason, e))
            }
            Ok(response) if !response.valid => Err(AuthError::RemoteRejected(response.message)),
            Ok(response) => {
                self.take_pushed_key(&response).await;
                self.vouched_claims(token, self.local.validate_refresh_token(token)).await
            }
        }
    }

    async fn validate_token(&self, token: &str) -> ValidationOutcome {
        let response = match self.ask_service(token).await {
            Ok(response) => response,
            Err(reason) => {
                debug!(%reason, "Identity service unavailable, validating locally");
                return self.local.validate_token(token).await;
            }
        };

        self.take_pushed_key(&response).await;

        if !response.valid {
            let message = response.message;
            return ValidationOutcome {
                valid: false,
                expired: response.expired,
                expires_at: response.expires_at,
                claims: None,
                error: Some(AuthError::RemoteRejected(message)),
            };
        }

        let claims =
            match self.vouched_claims(token, self.local.validate_access_token(token)).await {
                Ok(claims) => Some(claims),
                Err(e) => {
                    debug!(error = %e, "Could not read claims of service-approved token");
                    None
                }
            };
        let expires_at =
            response.expires_at.or_else(|| claims.as_ref().and_then(AccessTokenClaims::expires_at));

        ValidationOutcome { valid: true, expired: false, expires_at, claims, error: None }
    }
}
