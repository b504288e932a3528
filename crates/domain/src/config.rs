//! Configuration structures
//!
//! Every section is defaulted so a file only needs to name what it
//! overrides. Loading lives in `tiergate-infra::config`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS, DEFAULT_BCRYPT_COST,
    DEFAULT_OAUTH_AUTH_URL, DEFAULT_OAUTH_CALLBACK_PORT, DEFAULT_OAUTH_CLIENT_ID,
    DEFAULT_OAUTH_REDIRECT_URL, DEFAULT_OAUTH_SCOPES, DEFAULT_OAUTH_TIMEOUT_SECS,
    DEFAULT_OAUTH_TOKEN_URL, DEFAULT_OFFLINE_DB_FILE, DEFAULT_REFRESH_CHECK_INTERVAL_SECS,
    DEFAULT_REFRESH_THRESHOLD_SECS, KEYCHAIN_SERVICE, LOCAL_REFRESH_TTL_SECS,
    LOCAL_SESSION_TTL_SECS, PUBLIC_KEY_CACHE_TTL_SECS, PUBLIC_KEY_REFRESH_AHEAD_SECS,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityServiceConfig,
    pub oauth: OAuthSettings,
    pub refresh: RefreshSettings,
    pub key_cache: KeyCacheSettings,
    pub offline: OfflineStoreSettings,
    pub keychain: KeychainSettings,
    pub logging: LoggingSettings,
}

/// Remote identity service (tier 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityServiceConfig {
    pub base_url: String,
    /// Timeout for the validate call
    pub timeout_seconds: u64,
    /// Timeout for the public-key fetch, independent of `timeout_seconds`
    pub key_fetch_timeout_seconds: u64,
    /// Attempts per request; transport errors and 5xx are retried
    pub max_attempts: u32,
    /// Skip the remote tier and validate locally only
    pub local_only: bool,
}

impl Default for IdentityServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_API_TIMEOUT_SECS,
            key_fetch_timeout_seconds: DEFAULT_API_TIMEOUT_SECS,
            max_attempts: 1,
            local_only: false,
        }
    }
}

/// OAuth 2.0 authorization-code + PKCE client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub callback_port: u16,
    pub timeout_seconds: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_OAUTH_CLIENT_ID.to_string(),
            auth_url: DEFAULT_OAUTH_AUTH_URL.to_string(),
            token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            redirect_url: DEFAULT_OAUTH_REDIRECT_URL.to_string(),
            scopes: DEFAULT_OAUTH_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            callback_port: DEFAULT_OAUTH_CALLBACK_PORT,
            timeout_seconds: DEFAULT_OAUTH_TIMEOUT_SECS,
        }
    }
}

/// Background token renewal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub enabled: bool,
    /// Renew when this close to expiry
    pub threshold_seconds: u64,
    pub check_interval_seconds: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECS,
            check_interval_seconds: DEFAULT_REFRESH_CHECK_INTERVAL_SECS,
        }
    }
}

/// Public-key cache (tier 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCacheSettings {
    pub ttl_seconds: u64,
    pub refresh_ahead_seconds: u64,
}

impl Default for KeyCacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: PUBLIC_KEY_CACHE_TTL_SECS,
            refresh_ahead_seconds: PUBLIC_KEY_REFRESH_AHEAD_SECS,
        }
    }
}

/// Offline credential store (tier 3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineStoreSettings {
    pub enabled: bool,
    pub db_path: String,
    pub bcrypt_cost: u32,
    pub session_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl Default for OfflineStoreSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: DEFAULT_OFFLINE_DB_FILE.to_string(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            session_ttl_seconds: LOCAL_SESSION_TTL_SECS,
            refresh_ttl_seconds: LOCAL_REFRESH_TTL_SECS,
        }
    }
}

/// OS keychain persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainSettings {
    pub service_name: String,
}

impl Default for KeychainSettings {
    fn default() -> Self {
        Self { service_name: KEYCHAIN_SERVICE.to_string() }
    }
}

/// Tracing subscriber output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `TIERGATE_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
