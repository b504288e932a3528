//! Application constants
//!
//! Values fixed by the identity service contract and the CLI's defaults.

// Token contract
pub const TOKEN_ISSUER: &str = "ainative-auth";
pub const TOKEN_AUDIENCE: &str = "ainative-code";
pub const TOKEN_TYPE_BEARER: &str = "Bearer";
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

// Public-key cache
pub const PUBLIC_KEY_CACHE_TTL_SECS: u64 = 5 * 60;
pub const PUBLIC_KEY_REFRESH_AHEAD_SECS: u64 = 60;

// Identity service endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.ainative.studio";
pub const VALIDATE_ENDPOINT: &str = "/api/auth/validate";
pub const PUBLIC_KEY_ENDPOINT: &str = "/api/auth/public-key";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

// Refresh manager
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 5 * 60;
pub const MIN_REFRESH_THRESHOLD_SECS: u64 = 60;
pub const DEFAULT_REFRESH_CHECK_INTERVAL_SECS: u64 = 60;

// OAuth client
pub const DEFAULT_OAUTH_CLIENT_ID: &str = "ainative-code-cli";
pub const DEFAULT_OAUTH_AUTH_URL: &str = "https://auth.ainative.studio/oauth/authorize";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://auth.ainative.studio/oauth/token";
pub const DEFAULT_OAUTH_REDIRECT_URL: &str = "http://localhost:8080/callback";
pub const DEFAULT_OAUTH_SCOPES: [&str; 3] = ["read", "write", "offline_access"];
pub const DEFAULT_OAUTH_CALLBACK_PORT: u16 = 8080;
pub const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 30;

// Offline store
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const LOCAL_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
pub const LOCAL_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const LOCAL_TOKEN_BYTES: usize = 32;
pub const DEFAULT_OFFLINE_DB_FILE: &str = "tiergate-offline.db";

// Keychain
pub const KEYCHAIN_SERVICE: &str = "ainative-code";
pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_TOKEN_PAIR: &str = "token_pair";
pub const KEY_API_KEY: &str = "api_key";
pub const KEY_USER_EMAIL: &str = "user_email";
