//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, if the required ones are present
//! 2. Otherwise a config file, given explicitly or probed
//! 3. JSON and TOML are both accepted, chosen by extension
//!
//! Whatever the source, the result is checked with [`validate`].
//!
//! ## Environment Variables
//! Required:
//! - `TIERGATE_API_BASE_URL`: identity service base URL
//! - `TIERGATE_OFFLINE_DB_PATH`: offline store database file
//!
//! Optional (defaults otherwise):
//! - `TIERGATE_API_TIMEOUT`, `TIERGATE_KEY_FETCH_TIMEOUT`: seconds
//! - `TIERGATE_API_MAX_ATTEMPTS`
//! - `TIERGATE_LOCAL_ONLY`: skip the remote validator (bool)
//! - `TIERGATE_OAUTH_CLIENT_ID`, `TIERGATE_OAUTH_TOKEN_URL`,
//!   `TIERGATE_OAUTH_AUTH_URL`, `TIERGATE_OAUTH_REDIRECT_URL`
//! - `TIERGATE_REFRESH_ENABLED` (bool), `TIERGATE_REFRESH_THRESHOLD`,
//!   `TIERGATE_REFRESH_INTERVAL`: seconds
//! - `TIERGATE_OFFLINE_ENABLED` (bool), `TIERGATE_BCRYPT_COST`
//! - `TIERGATE_KEYCHAIN_SERVICE`
//! - `TIERGATE_LOG_LEVEL`, `TIERGATE_LOG_JSON` (bool)
//!
//! ## File Locations
//! Probed in order, first hit wins:
//! 1. `./tiergate.{toml,json}`, then `./config.{toml,json}`
//! 2. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tiergate_domain::{Config, Result, TiergateError};
use url::Url;

const FILE_STEMS: [&str; 2] = ["tiergate", "config"];
const FILE_EXTENSIONS: [&str; 2] = ["toml", "json"];
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Load configuration, preferring the environment over files.
///
/// # Errors
/// Returns `TiergateError::Config` if neither source yields a valid config
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `TIERGATE_*` variables.
///
/// # Errors
/// Returns `TiergateError::Config` if a required variable is missing or any
/// value fails to parse
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.identity.base_url = env_var("TIERGATE_API_BASE_URL")?;
    config.offline.db_path = env_var("TIERGATE_OFFLINE_DB_PATH")?;

    if let Some(secs) = env_parse("TIERGATE_API_TIMEOUT")? {
        config.identity.timeout_seconds = secs;
    }
    if let Some(secs) = env_parse("TIERGATE_KEY_FETCH_TIMEOUT")? {
        config.identity.key_fetch_timeout_seconds = secs;
    }
    if let Some(attempts) = env_parse("TIERGATE_API_MAX_ATTEMPTS")? {
        config.identity.max_attempts = attempts;
    }
    config.identity.local_only = env_bool("TIERGATE_LOCAL_ONLY", config.identity.local_only);

    override_string("TIERGATE_OAUTH_CLIENT_ID", &mut config.oauth.client_id);
    override_string("TIERGATE_OAUTH_AUTH_URL", &mut config.oauth.auth_url);
    override_string("TIERGATE_OAUTH_TOKEN_URL", &mut config.oauth.token_url);
    override_string("TIERGATE_OAUTH_REDIRECT_URL", &mut config.oauth.redirect_url);

    config.refresh.enabled = env_bool("TIERGATE_REFRESH_ENABLED", config.refresh.enabled);
    if let Some(secs) = env_parse("TIERGATE_REFRESH_THRESHOLD")? {
        config.refresh.threshold_seconds = secs;
    }
    if let Some(secs) = env_parse("TIERGATE_REFRESH_INTERVAL")? {
        config.refresh.check_interval_seconds = secs;
    }

    config.offline.enabled = env_bool("TIERGATE_OFFLINE_ENABLED", config.offline.enabled);
    if let Some(cost) = env_parse("TIERGATE_BCRYPT_COST")? {
        config.offline.bcrypt_cost = cost;
    }

    override_string("TIERGATE_KEYCHAIN_SERVICE", &mut config.keychain.service_name);
    override_string("TIERGATE_LOG_LEVEL", &mut config.logging.level);
    config.logging.json = env_bool("TIERGATE_LOG_JSON", config.logging.json);

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file, probing when `path` is `None`.
///
/// # Errors
/// Returns `TiergateError::Config` if no file is found, it cannot be read,
/// or its content is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.exists() => p,
        Some(p) => {
            return Err(TiergateError::Config(format!("Config file not found: {}", p.display())))
        }
        None => probe_config_paths().ok_or_else(|| {
            TiergateError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TiergateError::Config(format!("Failed to read config file: {e}")))?;
    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Check values a deserializer cannot.
///
/// # Errors
/// Returns `TiergateError::Config` naming the first offending field
pub fn validate(config: &Config) -> Result<()> {
    Url::parse(&config.identity.base_url).map_err(|e| {
        TiergateError::Config(format!(
            "identity.base_url {:?} is not a URL: {e}",
            config.identity.base_url
        ))
    })?;
    if config.identity.timeout_seconds == 0 || config.identity.key_fetch_timeout_seconds == 0 {
        return Err(TiergateError::Config("identity timeouts must be non-zero".into()));
    }
    if config.offline.enabled && config.offline.db_path.trim().is_empty() {
        return Err(TiergateError::Config("offline.db_path is required".into()));
    }
    if !BCRYPT_COST_RANGE.contains(&config.offline.bcrypt_cost) {
        return Err(TiergateError::Config(format!(
            "offline.bcrypt_cost must be within {}..={}",
            BCRYPT_COST_RANGE.start(),
            BCRYPT_COST_RANGE.end()
        )));
    }
    if config.key_cache.ttl_seconds == 0 {
        return Err(TiergateError::Config("key_cache.ttl_seconds must be non-zero".into()));
    }
    Ok(())
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TiergateError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TiergateError::Config(format!("Invalid JSON format: {e}"))),
        other => Err(TiergateError::Config(format!("Unsupported config format: {other}"))),
    }
}

/// First existing config file among the standard locations.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}")))
            })
        })
        .find(|candidate| candidate.exists())
}

fn env_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(TiergateError::Config(format!("Missing required environment variable: {key}"))),
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TiergateError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`true`/`yes`/`on` as true, anything else set as false.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{Builder, NamedTempFile};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const OPTIONAL_VARS: [&str; 6] = [
        "TIERGATE_API_TIMEOUT",
        "TIERGATE_BCRYPT_COST",
        "TIERGATE_LOCAL_ONLY",
        "TIERGATE_REFRESH_THRESHOLD",
        "TIERGATE_LOG_JSON",
        "TIERGATE_OAUTH_CLIENT_ID",
    ];

    fn clear_env() {
        std::env::remove_var("TIERGATE_API_BASE_URL");
        std::env::remove_var("TIERGATE_OFFLINE_DB_PATH");
        for key in OPTIONAL_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(extension: &str, contents: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(&format!(".{extension}")).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (value, expected) in [("1", true), ("TRUE", true), ("on", true), ("no", false)] {
            std::env::set_var("TIERGATE_TEST_BOOL", value);
            assert_eq!(env_bool("TIERGATE_TEST_BOOL", !expected), expected, "value {value}");
        }
        std::env::remove_var("TIERGATE_TEST_BOOL");
        assert!(env_bool("TIERGATE_TEST_BOOL", true));
    }

    #[test]
    fn test_load_from_env_with_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TIERGATE_API_BASE_URL", "http://localhost:9000");
        std::env::set_var("TIERGATE_OFFLINE_DB_PATH", "/tmp/tiergate-test.db");
        std::env::set_var("TIERGATE_API_TIMEOUT", "3");
        std::env::set_var("TIERGATE_BCRYPT_COST", "4");
        std::env::set_var("TIERGATE_LOCAL_ONLY", "yes");
        std::env::set_var("TIERGATE_OAUTH_CLIENT_ID", "custom-cli");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.identity.base_url, "http://localhost:9000");
        assert_eq!(config.identity.timeout_seconds, 3);
        assert!(config.identity.local_only);
        assert_eq!(config.offline.db_path, "/tmp/tiergate-test.db");
        assert_eq!(config.offline.bcrypt_cost, 4);
        assert_eq!(config.oauth.client_id, "custom-cli");
        assert_eq!(config.refresh, tiergate_domain::RefreshSettings::default());
    }

    #[test]
    fn test_load_from_env_missing_required() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TIERGATE_API_BASE_URL", "http://localhost:9000");

        let err = load_from_env().unwrap_err();
        clear_env();

        assert_eq!(
            err,
            TiergateError::Config(
                "Missing required environment variable: TIERGATE_OFFLINE_DB_PATH".into()
            )
        );
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TIERGATE_API_BASE_URL", "http://localhost:9000");
        std::env::set_var("TIERGATE_OFFLINE_DB_PATH", "/tmp/x.db");
        std::env::set_var("TIERGATE_REFRESH_THRESHOLD", "soon");

        let result = load_from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(TiergateError::Config(msg)) if msg.contains("TIERGATE_REFRESH_THRESHOLD")
        ));
    }

    #[test]
    fn test_load_from_file_toml() {
        let file = temp_config(
            "toml",
            r#"
[identity]
base_url = "http://127.0.0.1:7000"
max_attempts = 2

[offline]
db_path = "offline.db"
bcrypt_cost = 5
"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.identity.base_url, "http://127.0.0.1:7000");
        assert_eq!(config.identity.max_attempts, 2);
        assert_eq!(config.offline.bcrypt_cost, 5);
    }

    #[test]
    fn test_load_from_file_json() {
        let file = temp_config(
            "json",
            r#"{ "identity": { "local_only": true }, "logging": { "json": true } }"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert!(config.identity.local_only);
        assert!(config.logging.json);
        assert_eq!(config.offline, tiergate_domain::OfflineStoreSettings::default());
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = temp_config("toml", "[offline]\nbcrypt_cost = 2\n");
        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, TiergateError::Config(msg) if msg.contains("bcrypt_cost")));

        let file = temp_config("json", r#"{ "identity": { "base_url": "nowhere" } }"#);
        assert!(load_from_file(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/tiergate.toml")));
        assert!(matches!(result, Err(TiergateError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("a: b", Path::new("tiergate.yaml"));
        assert!(matches!(result, Err(TiergateError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_load_prefers_environment() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TIERGATE_API_BASE_URL", "http://env.example.com");
        std::env::set_var("TIERGATE_OFFLINE_DB_PATH", "/tmp/env.db");

        let config = load().unwrap();
        clear_env();

        assert_eq!(config.identity.base_url, "http://env.example.com");
    }
}
