//! Integration tests for background renewal
//!
//! Drives the refresh manager against a wiremock token endpoint and persists
//! renewed pairs through the credential store.

#![cfg(feature = "platform")]

use std::sync::Arc;
use std::time::Duration;

use tiergate_common::auth::refresh::{RefreshConfig, RefreshManager};
use tiergate_common::auth::{CredentialStore, OAuthClient, OAuthConfig, TokenStore};
use tiergate_common::testing::MockKeychainProvider;
use tiergate_domain::TokenPair;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oauth_client(server: &MockServer) -> Arc<OAuthClient> {
    let config = OAuthConfig::new(
        "ainative-code-cli",
        format!("{}/oauth/authorize", server.uri()),
        format!("{}/oauth/token", server.uri()),
        "http://localhost:8080/callback",
        vec!["read".to_string(), "offline_access".to_string()],
    );
    Arc::new(OAuthClient::new(config))
}

/// Validates that a token about to lapse is renewed before it expires.
///
/// # Test Steps
/// 1. Start the manager with a token expiring in 1s and a 1 minute threshold
/// 2. The loop checks every 50ms and calls the token endpoint
/// 3. The renewed pair lands in memory and in the credential store
#[tokio::test(flavor = "multi_thread")]
async fn test_renews_before_expiry_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=initial-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "renewed-access",
            "refresh_token": "renewed-refresh",
            "token_type": "Bearer",
            "expires_in": 86400
        })))
        .expect(1..)
        .mount(&server)
        .await;

    let store = Arc::new(CredentialStore::new(MockKeychainProvider::new("tiergate-it")));
    let manager = RefreshManager::new(
        oauth_client(&server),
        RefreshConfig::new(Duration::from_secs(60), Duration::from_millis(50)),
    )
    .with_token_store(Arc::clone(&store) as Arc<dyn TokenStore>);

    let parent = CancellationToken::new();
    manager
        .start(&parent, TokenPair::new("initial-access", "initial-refresh", 1))
        .await
        .expect("start");

    tokio::time::timeout(Duration::from_millis(900), async {
        while manager.get_last_refresh_at().await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("renewed before the original token lapsed");

    let tokens = manager.get_tokens().await.expect("tokens");
    assert_eq!(tokens.access_token, "renewed-access");
    assert!(!manager.get_refresh_status().await.needs_refresh);

    let persisted = store.load_token_pair().expect("keychain").expect("stored pair");
    assert_eq!(persisted.refresh_token, "renewed-refresh");

    manager.stop().await;
    assert!(!manager.is_running());
}

/// Validates that a revoked refresh token asks for a new login.
///
/// # Test Steps
/// 1. The token endpoint answers `invalid_grant`
/// 2. A fail hook maps `invalid_grant` to re-authentication
/// 3. `force_refresh` reports re-authentication and keeps the old pair
#[tokio::test(flavor = "multi_thread")]
async fn test_revoked_refresh_token_requires_reauth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .mount(&server)
        .await;

    let manager = RefreshManager::new(oauth_client(&server), RefreshConfig::default())
        .with_refresh_fail_hook(|err| err.is_invalid_grant());
    manager.update_tokens(TokenPair::new("access", "revoked", 3600)).await;

    let err = manager.force_refresh(&CancellationToken::new()).await.unwrap_err();

    assert!(err.requires_reauth());
    assert_eq!(manager.get_tokens().await.expect("kept").access_token, "access");
    assert!(manager.get_last_refresh_at().await.is_none());
}
