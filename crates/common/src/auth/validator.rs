//! Token validators
//!
//! [`TokenValidator`] is the seam between callers and the validation tiers.
//! [`LocalValidator`] verifies signatures against the cached public key and
//! never touches the network except to fill the cache.

use async_trait::async_trait;
use tiergate_domain::{AccessTokenClaims, RefreshTokenClaims};
use tracing::{debug, warn};

use super::codec;
use super::error::AuthResult;
use super::key_cache::PublicKeyCache;
use super::types::ValidationOutcome;

/// Validates identity-service tokens
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Verify an access token.
    ///
    /// # Errors
    /// Returns the `AuthError` explaining why the token is not acceptable.
    async fn validate_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims>;

    /// Verify a refresh token.
    ///
    /// # Errors
    /// Returns the `AuthError` explaining why the token is not acceptable.
    async fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims>;

    /// Validate an access token, reporting the result instead of failing.
    async fn validate_token(&self, token: &str) -> ValidationOutcome;
}

/// Tier-2 validator: local cryptography against the cached key
///
/// Any failed validation invalidates the cache so a rotated key is picked
/// up on the next call.
#[derive(Debug, Clone)]
pub struct LocalValidator {
    cache: PublicKeyCache,
}

impl LocalValidator {
    /// Create a validator over a shared key cache.
    #[must_use]
    pub const fn new(cache: PublicKeyCache) -> Self {
        Self { cache }
    }

    /// The key cache backing this validator.
    #[must_use]
    pub const fn cache(&self) -> &PublicKeyCache {
        &self.cache
    }

    async fn invalidate_after_failure(&self) {
        debug!("Local validation failed, invalidating public key cache");
        if let Err(e) = self.cache.invalidate().await {
            warn!(error = %e, "Cache invalidation hook failed");
        }
    }
}

#[async_trait]
impl TokenValidator for LocalValidator {
    async fn validate_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let key = self.cache.get_public_key().await?;
        let result = codec::validate_access_token(token, key.decoding_key());
        if result.is_err() {
            self.invalidate_after_failure().await;
        }
        result
    }

    async fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        let key = self.cache.get_public_key().await?;
        let result = codec::validate_refresh_token(token, key.decoding_key());
        if result.is_err() {
            self.invalidate_after_failure().await;
        }
        result
    }

    async fn validate_token(&self, token: &str) -> ValidationOutcome {
        let key = match self.cache.get_public_key().await {
            Ok(key) => key,
            Err(e) => return ValidationOutcome::invalid(e),
        };

        let outcome = codec::validate_token(token, key.decoding_key());
        if !outcome.valid {
            self.invalidate_after_failure().await;
        }
        outcome
    }
}
