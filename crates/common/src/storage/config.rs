//! Storage configuration

use std::time::Duration;

/// Connection pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlitePoolConfig {
    /// Maximum pooled connections (default: 4)
    pub max_size: u32,

    /// How long `get` waits for a free connection (default: 5s)
    pub connection_timeout: Duration,

    /// SQLite busy timeout (default: 5s)
    pub busy_timeout: Duration,

    /// Enable WAL mode (default: true)
    pub enable_wal: bool,

    /// Enable foreign keys (default: true)
    pub enable_foreign_keys: bool,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqlitePoolConfig {
    /// Override the pool size.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// Returns a description of the first invalid field
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be at least 1".to_string());
        }
        if self.connection_timeout.is_zero() {
            return Err("connection_timeout must be non-zero".to_string());
        }
        Ok(())
    }
}
