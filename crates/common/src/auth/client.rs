//! OAuth 2.0 client implementation with PKCE support
//!
//! Handles the authorization-code flow against the identity provider:
//! - Browser authorization URL building
//! - Authorization code exchange with the PKCE verifier
//! - Token refresh

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tiergate_domain::TokenPair;
use tracing::{debug, instrument, warn};
use url::Url;

use super::pkce::{validate_code_verifier, PkceError, PkceParams};
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenResponse};

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed
    RequestFailed(reqwest::Error),

    /// OAuth server returned an error
    OAuthError(OAuthError),

    /// Server returned a non-success status without an OAuth error body
    Status { status: u16, body: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),

    /// PKCE generation or verifier validation failed
    Pkce(PkceError),
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::OAuthError(e) => write!(f, "OAuth error: {e}"),
            Self::Status { status, body } => write!(f, "token endpoint returned {status}: {body}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::Pkce(e) => write!(f, "PKCE error: {e}"),
        }
    }
}

impl std::error::Error for OAuthClientError {}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

impl From<PkceError> for OAuthClientError {
    fn from(err: PkceError) -> Self {
        Self::Pkce(err)
    }
}

impl OAuthClientError {
    /// Whether the server said the grant is no longer usable.
    #[must_use]
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, Self::OAuthError(e) if e.error == "invalid_grant")
    }
}

/// OAuth 2.0 client with PKCE support
///
/// Public client: no secret is ever sent. Implements RFC 6749 and RFC 7636.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    ///
    /// # Examples
    /// ```
    /// use tiergate_common::auth::{OAuthClient, OAuthConfig};
    ///
    /// let client = OAuthClient::new(OAuthConfig::default());
    /// assert_eq!(client.redirect_uri(), "http://localhost:8080/callback");
    /// ```
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    /// Build the authorization URL for a PKCE attempt
    ///
    /// # Errors
    /// Returns `OAuthClientError::ConfigError` if the authorization endpoint
    /// is not a valid URL
    pub fn authorization_url(&self, pkce: &PkceParams) -> Result<String, OAuthClientError> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| OAuthClientError::ConfigError(format!("invalid auth URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope_string())
            .append_pair("state", &pkce.state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", &pkce.method);

        Ok(url.into())
    }

    /// Generate fresh PKCE parameters and the matching authorization URL
    ///
    /// The returned parameters must be kept until the callback arrives: the
    /// state is compared against the callback and the verifier is sent with
    /// the code exchange.
    ///
    /// # Errors
    /// Returns error if PKCE generation fails or the URL is invalid
    pub fn start_authorization(&self) -> Result<(String, PkceParams), OAuthClientError> {
        let pkce = PkceParams::generate()?;
        let url = self.authorization_url(&pkce)?;
        Ok((url, pkce))
    }

    /// Exchange authorization code for tokens
    ///
    /// # Errors
    /// Returns error if:
    /// - The verifier fails PKCE validation
    /// - Token exchange fails
    /// - Response parsing fails
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        validate_code_verifier(code_verifier)?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        debug!("Exchanging authorization code");
        let response = self.client.post(&self.config.token_url).form(&params).send().await?;
        Self::parse_token_response(response).await
    }

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - Refresh fails
    /// - Token is invalid/revoked
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        debug!("Refreshing tokens");
        let response = self.client.post(&self.config.token_url).form(&params).send().await?;
        Self::parse_token_response(response).await
    }

    /// Get the configured redirect URI
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.config.redirect_uri
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn parse_token_response(response: Response) -> Result<TokenPair, OAuthClientError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OAuthError>(&body) {
                warn!(status = status.as_u16(), error = %error.error, "Token endpoint error");
                return Err(OAuthClientError::OAuthError(error));
            }
            return Err(OAuthClientError::Status { status: status.as_u16(), body });
        }

        let token_response: TokenResponse =
            serde_json::from_str(&body).map_err(|e| OAuthClientError::ParseError(e.to_string()))?;
        if token_response.access_token.is_empty() {
            return Err(OAuthClientError::ParseError("empty access_token".to_string()));
        }

        Ok(token_response.into())
    }
}

// Implement OAuthClientTrait for OAuthClient
#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(&self, pkce: &PkceParams) -> Result<String, OAuthClientError> {
        self.authorization_url(pkce)
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        self.exchange_code(code, code_verifier).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, OAuthClientError> {
        self.refresh_token(refresh_token).await
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uri()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> OAuthConfig {
        OAuthConfig::new(
            "test_client_id",
            "https://auth.example.com/oauth/authorize",
            format!("{}/oauth/token", server.uri()),
            "http://localhost:8080/callback",
            vec!["read".to_string(), "offline_access".to_string()],
        )
    }

    /// Validates `OAuthClient::authorization_url` behavior for the query
    /// parameters scenario.
    ///
    /// Assertions:
    /// - Ensures the URL carries response type, client id, redirect, scope,
    ///   state and the S256 challenge.
    #[test]
    fn test_authorization_url() {
        let client = OAuthClient::new(OAuthConfig::default());
        let (url, pkce) = client.start_authorization().unwrap();

        assert!(url.starts_with("https://auth.ainative.studio/oauth/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=ainative-code-cli"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"));
        assert!(url.contains("scope=read+write+offline_access"));
        assert!(url.contains(&format!("state={}", pkce.state)));
        assert!(url.contains(&format!("code_challenge={}", pkce.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(!url.contains(&pkce.code_verifier));
    }

    /// Validates `OAuthClient::authorization_url` behavior for the bad
    /// endpoint scenario.
    ///
    /// Assertions:
    /// - Ensures a non-URL endpoint yields `ConfigError`.
    #[test]
    fn test_authorization_url_rejects_bad_endpoint() {
        let mut config = OAuthConfig::default();
        config.auth_url = "not a url".to_string();
        let client = OAuthClient::new(config);
        let pkce = PkceParams::generate().unwrap();

        assert!(matches!(client.authorization_url(&pkce), Err(OAuthClientError::ConfigError(_))));
    }

    /// Validates `OAuthClient::refresh_token` behavior for the refresh with
    /// empty token scenario.
    ///
    /// Assertions:
    /// - Ensures `NoRefreshToken` is returned without a request.
    #[tokio::test]
    async fn test_refresh_with_empty_token() {
        let client = OAuthClient::new(OAuthConfig::default());
        let result = client.refresh_token("").await;
        assert!(matches!(result, Err(OAuthClientError::NoRefreshToken)));
    }

    /// Validates `OAuthClient::refresh_token` behavior for the successful
    /// grant scenario.
    ///
    /// Assertions:
    /// - Confirms the form carries the refresh grant.
    /// - Confirms the new pair is returned.
    #[tokio::test]
    async fn test_refresh_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server));
        let pair = client.refresh_token("old-refresh").await.unwrap();

        assert_eq!(pair.access_token, "new-access");
        assert_eq!(pair.refresh_token, "new-refresh");
        assert_eq!(pair.expires_in, 3600);
    }

    /// Validates `OAuthClient::refresh_token` behavior for the OAuth error
    /// body scenario.
    ///
    /// Assertions:
    /// - Ensures a 400 with an `invalid_grant` body maps to `OAuthError`.
    /// - Ensures a 502 with a plain body maps to `Status`.
    #[tokio::test]
    async fn test_refresh_token_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=revoked"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=flaky"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server));

        let err = client.refresh_token("revoked").await.unwrap_err();
        assert!(err.is_invalid_grant());

        let err = client.refresh_token("flaky").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::Status { status: 502, .. }));
    }

    /// Validates `OAuthClient::exchange_code` behavior for the verifier
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a malformed verifier is rejected before any request.
    /// - Confirms a valid exchange posts the verifier and returns tokens.
    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        let pkce = PkceParams::generate().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains(format!("code_verifier={}", pkce.code_verifier)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 86400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server));

        let err = client.exchange_code("code-1", "short").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::Pkce(PkceError::InvalidCodeVerifier(_))));

        let pair = client.exchange_code("code-1", &pkce.code_verifier).await.unwrap();
        assert_eq!(pair.access_token, "access");
        assert_eq!(pair.token_type, "Bearer");
    }
}
