//! Global tracing subscriber
//!
//! `TIERGATE_LOG` takes an `EnvFilter` directive and wins over the configured
//! level. Output is human-readable unless `json` is set.

use tiergate_domain::{LoggingSettings, Result, TiergateError};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive
pub const LOG_ENV_VAR: &str = "TIERGATE_LOG";

/// Build the filter from `TIERGATE_LOG`, falling back to `settings.level`.
///
/// # Errors
/// Returns `TiergateError::Config` if the configured level is not a valid
/// directive
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_env(LOG_ENV_VAR) {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            TiergateError::Config(format!("invalid log level {:?}: {e}", settings.level))
        }),
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `TiergateError::Config` for a bad level and
/// `TiergateError::Internal` when a subscriber is already installed
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|error| {
        TiergateError::Internal(format!("failed to initialize tracing subscriber: {error}"))
    })
}
