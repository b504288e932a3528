//! Mock implementations of the auth seams
//!
//! In-memory stand-ins for the key endpoint, the OAuth token endpoint, the
//! token persistence sink, and the OS keychain.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "platform")]
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(feature = "platform")]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tiergate_domain::TokenPair;

use crate::auth::{
    AuthError, AuthResult, KeyFetcher, OAuthClientError, OAuthClientTrait, OAuthError,
    PkceParams, TokenStore,
};
#[cfg(feature = "platform")]
use crate::security::{KeychainError, KeychainTrait};

/// Mock key endpoint serving a configurable PEM
///
/// # Examples
///
/// ```
/// use tiergate_common::auth::KeyFetcher;
/// use tiergate_common::testing::{fixtures, MockKeyFetcher};
///
/// # tokio_test::block_on(async {
/// let fetcher = MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM);
/// assert_eq!(fetcher.fetch_public_key().await.unwrap(), fixtures::PUBLIC_KEY_A_PEM);
/// assert_eq!(fetcher.fetch_count(), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct MockKeyFetcher {
    pem: Mutex<String>,
    delay: Mutex<Option<Duration>>,
    should_fail: AtomicBool,
    fetch_count: AtomicUsize,
}

impl MockKeyFetcher {
    /// Create a fetcher that serves `pem`.
    pub fn new(pem: impl Into<String>) -> Self {
        Self {
            pem: Mutex::new(pem.into()),
            delay: Mutex::new(None),
            should_fail: AtomicBool::new(false),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` inside every fetch.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    /// Change the per-fetch delay; `None` answers immediately.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Make subsequent fetches fail with `AuthError::KeyFetch`.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Serve a different key from now on, e.g. to simulate rotation.
    pub fn set_pem(&self, pem: &str) {
        *self.pem.lock() = pem.to_string();
    }

    /// Number of fetches started so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for MockKeyFetcher {
    async fn fetch_public_key(&self) -> AuthResult<String> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(AuthError::KeyFetch("mock key endpoint unavailable".to_string()));
        }

        Ok(self.pem.lock().clone())
    }
}

/// Mock OAuth client that simulates the token endpoint without network calls.
#[derive(Debug, Default)]
pub struct MockOAuthClient {
    refresh_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
    refresh_token_response: Mutex<Option<TokenPair>>,
    refresh_delay: Mutex<Option<Duration>>,
    should_fail: AtomicBool,
}

impl MockOAuthClient {
    /// Create a new mock OAuth client with default state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the pair returned by `refresh_token`.
    pub fn set_refresh_response(&self, tokens: TokenPair) {
        *self.refresh_token_response.lock() = Some(tokens);
    }

    /// Make the refresh grant fail with `invalid_grant`.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Stall every refresh grant for `delay`; `None` answers immediately.
    pub fn set_refresh_delay(&self, delay: Option<Duration>) {
        *self.refresh_delay.lock() = delay;
    }

    /// Check whether refresh was called.
    #[must_use]
    pub fn was_refresh_called(&self) -> bool {
        self.refresh_call_count() > 0
    }

    /// Number of refresh grants attempted.
    #[must_use]
    pub fn refresh_call_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// The refresh token sent with the most recent grant.
    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }

    /// Reset internal state.
    pub fn reset(&self) {
        self.refresh_calls.store(0, Ordering::SeqCst);
        *self.last_refresh_token.lock() = None;
        *self.refresh_token_response.lock() = None;
        *self.refresh_delay.lock() = None;
        self.should_fail.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(&self, pkce: &PkceParams) -> Result<String, OAuthClientError> {
        Ok(format!(
            "https://auth.example.com/oauth/authorize?state={}&code_challenge={}",
            pkce.state, pkce.code_challenge
        ))
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _code_verifier: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        Ok(TokenPair::new("mock_access_token", "mock_refresh_token", 3600))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, OAuthClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = Some(refresh_token.to_string());

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(OAuthClientError::OAuthError(OAuthError {
                error: "invalid_grant".to_string(),
                error_description: Some("refresh token revoked".to_string()),
            }));
        }

        Ok(self
            .refresh_token_response
            .lock()
            .clone()
            .unwrap_or_else(|| TokenPair::new("refreshed_access_token", "refreshed_refresh_token", 3600)))
    }

    fn redirect_uri(&self) -> &str {
        "http://localhost:8080/callback"
    }
}

/// Token sink that records every pair it is given
#[derive(Debug, Default)]
pub struct MockTokenStore {
    stored: Mutex<Vec<TokenPair>>,
    should_fail: AtomicBool,
}

impl MockTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Pairs stored so far, oldest first.
    #[must_use]
    pub fn stored(&self) -> Vec<TokenPair> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn store_tokens(&self, tokens: &TokenPair) -> Result<(), String> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err("mock token store unavailable".to_string());
        }
        self.stored.lock().push(tokens.clone());
        Ok(())
    }
}

/// Mock keychain provider that stores credentials in memory.
///
/// This implementation avoids platform keychain prompts and persists data only
/// for the lifetime of the mock, making it ideal for tests.
#[cfg(feature = "platform")]
#[derive(Clone, Debug)]
pub struct MockKeychainProvider {
    storage: Arc<Mutex<HashMap<String, String>>>,
    service_name: String,
}

#[cfg(feature = "platform")]
impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { storage: Arc::new(Mutex::new(HashMap::new())), service_name: service_name.into() }
    }

    /// Get the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.lock().is_empty()
    }
}

#[cfg(feature = "platform")]
impl KeychainTrait for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.storage.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.storage.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.storage.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::mocks.
    use super::*;

    /// Validates `MockOAuthClient` behavior for the failure toggle scenario.
    ///
    /// Assertions:
    /// - Ensures a failing grant reports `invalid_grant`.
    /// - Confirms `reset` clears recorded calls.
    #[tokio::test]
    async fn test_mock_oauth_client_failure_and_reset() {
        let client = MockOAuthClient::new();
        client.set_should_fail(true);

        let err = client.refresh_token("r1").await.unwrap_err();
        assert!(err.is_invalid_grant());
        assert_eq!(client.last_refresh_token().as_deref(), Some("r1"));

        client.reset();
        assert!(!client.was_refresh_called());
        let pair = client.refresh_token("r2").await.unwrap();
        assert_eq!(pair.access_token, "refreshed_access_token");
    }

    /// Validates `MockKeyFetcher` behavior for the failure toggle scenario.
    ///
    /// Assertions:
    /// - Ensures failed fetches are still counted.
    #[tokio::test]
    async fn test_mock_key_fetcher_counts_failures() {
        let fetcher = MockKeyFetcher::new("pem");
        fetcher.set_should_fail(true);

        assert!(matches!(fetcher.fetch_public_key().await, Err(AuthError::KeyFetch(_))));
        assert_eq!(fetcher.fetch_count(), 1);
    }
}
