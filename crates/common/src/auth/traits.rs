//! Traits for OAuth and token persistence
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (OAuth servers, token storage).

use async_trait::async_trait;
use tiergate_domain::TokenPair;

use super::client::OAuthClientError;
use super::pkce::PkceParams;

/// Trait for OAuth client operations
///
/// This trait abstracts OAuth operations to enable testing with mock
/// implementations and to support different OAuth providers or configurations.
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Build the browser authorization URL for one PKCE attempt
    ///
    /// # Errors
    /// Returns error if the configured authorization endpoint is not a URL
    fn authorization_url(&self, pkce: &PkceParams) -> Result<String, OAuthClientError>;

    /// Exchange authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from redirect callback
    /// * `code_verifier` - PKCE verifier generated for this attempt
    ///
    /// # Errors
    /// Returns error if the verifier is malformed, the exchange fails, or
    /// the response cannot be parsed
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPair, OAuthClientError>;

    /// Renew tokens using a refresh token
    ///
    /// # Errors
    /// Returns error if refresh fails or token is invalid/revoked
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, OAuthClientError>;

    /// Get the configured redirect URI
    fn redirect_uri(&self) -> &str;
}

/// Sink for renewed tokens
///
/// The refresh manager hands every renewed pair to the store. A store
/// failure is logged by the caller; the in-memory pair stays authoritative.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a token pair
    ///
    /// # Errors
    /// Returns a description of the storage failure
    async fn store_tokens(&self, tokens: &TokenPair) -> Result<(), String>;
}
