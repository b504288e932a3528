//! Auth result and OAuth wire types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tiergate_domain::constants::{DEFAULT_OAUTH_TIMEOUT_SECS, TOKEN_TYPE_BEARER};
use tiergate_domain::{AccessTokenClaims, OAuthSettings, TokenPair};

use super::error::AuthError;

/// Result of a non-failing token validation
///
/// `valid` and `expired` are never both true. `expires_at` is filled for
/// valid tokens and, when readable, for expired ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub claims: Option<AccessTokenClaims>,
    pub error: Option<AuthError>,
}

impl ValidationOutcome {
    /// Outcome for a token that verified.
    #[must_use]
    pub fn valid(claims: AccessTokenClaims) -> Self {
        Self {
            valid: true,
            expired: false,
            expires_at: claims.expires_at(),
            claims: Some(claims),
            error: None,
        }
    }

    /// Outcome for a token that did not verify.
    #[must_use]
    pub fn invalid(error: AuthError) -> Self {
        Self {
            valid: false,
            expired: error.is_expired(),
            expires_at: error.expires_at(),
            claims: None,
            error: Some(error),
        }
    }
}

/// OAuth 2.0 client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub timeout_seconds: u64,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            timeout_seconds: DEFAULT_OAUTH_TIMEOUT_SECS,
        }
    }

    /// Get scopes as space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::from(&OAuthSettings::default())
    }
}

impl From<&OAuthSettings> for OAuthConfig {
    fn from(settings: &OAuthSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
            redirect_uri: settings.redirect_url.clone(),
            scopes: settings.scopes.clone(),
            timeout_seconds: settings.timeout_seconds,
        }
    }
}

/// OAuth token response from the authorization server (RFC 6749 §5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            expires_in: response.expires_in,
            token_type: response.token_type.unwrap_or_else(|| TOKEN_TYPE_BEARER.to_string()),
        }
    }
}

/// OAuth error response from authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates the token response conversion scenario.
    ///
    /// Assertions:
    /// - Confirms tokens and lifetime carry over.
    /// - Confirms a missing refresh token becomes an empty string.
    /// - Confirms a missing token type defaults to `Bearer`.
    #[test]
    fn test_token_response_conversion() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"access123","expires_in":3600}"#).unwrap();
        let pair: TokenPair = response.into();

        assert_eq!(pair.access_token, "access123");
        assert_eq!(pair.refresh_token, "");
        assert_eq!(pair.expires_in, 3600);
        assert_eq!(pair.token_type, "Bearer");
    }

    /// Validates `OAuthConfig::default` behavior for the built-in provider
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the default client id and scope string.
    #[test]
    fn test_oauth_config_defaults() {
        let config = OAuthConfig::default();
        assert_eq!(config.client_id, "ainative-code-cli");
        assert_eq!(config.scope_string(), "read write offline_access");
        assert_eq!(config.timeout_seconds, 30);
    }

    /// Validates the oauth error display scenario.
    ///
    /// Assertions:
    /// - Ensures description is appended when present.
    /// - Confirms the bare code is shown otherwise.
    #[test]
    fn test_oauth_error_display() {
        let error = OAuthError {
            error: "invalid_grant".to_string(),
            error_description: Some("The refresh token is invalid".to_string()),
        };
        assert_eq!(error.to_string(), "invalid_grant: The refresh token is invalid");

        let error = OAuthError { error: "invalid_request".to_string(), error_description: None };
        assert_eq!(error.to_string(), "invalid_request");
    }

    /// Validates `ValidationOutcome::invalid` behavior for the expiry flag
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the `expired` flag comes from the typed error.
    #[test]
    fn test_outcome_expired_flag_is_typed() {
        let outcome = ValidationOutcome::invalid(AuthError::Expired { expires_at: None });
        assert!(outcome.expired);
        assert!(!outcome.valid);

        let outcome = ValidationOutcome::invalid(AuthError::Rejected("expired".into()));
        assert!(!outcome.expired);
    }
}
