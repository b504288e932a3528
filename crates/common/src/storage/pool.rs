//! SQLite connection pool
//!
//! r2d2 pool over `SqliteConnectionManager`; every connection gets the same
//! pragmas on open.

use std::path::{Path, PathBuf};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::error::{StorageError, StorageResult};

/// Connection checked out of a [`SqlitePool`]
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Apply connection-level pragmas
///
/// - WAL journal with periodic checkpoints
/// - NORMAL synchronous mode
/// - Foreign key constraints
/// - Busy timeout for lock contention
///
/// # Errors
/// Returns `StorageError::Query` if a pragma is refused
pub fn apply_connection_pragmas(conn: &Connection, config: &SqlitePoolConfig) -> StorageResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }
    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");
    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("Failed to apply pragmas: {e}")))?;
    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("Failed to set busy timeout: {e}")))?;

    Ok(())
}

/// Pooled SQLite database
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqlitePool {
    /// Open (creating if needed) the database at `path`
    ///
    /// The parent directory is created when missing. One connection is
    /// opened eagerly so a bad path fails here rather than on first use.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, the directory cannot be
    /// created, or the pool cannot open a connection
    #[instrument(skip(config), fields(db_path = %path.display(), pool_size = config.max_size))]
    pub fn open(path: &Path, config: &SqlitePoolConfig) -> StorageResult<Self> {
        config.validate().map_err(StorageError::InvalidConfig)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pragma_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pragma_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        info!("SQLite pool ready");
        Ok(Self { pool, path: path.to_path_buf() })
    }

    /// Check out a connection
    ///
    /// # Errors
    /// Returns `StorageError::R2d2` if no connection frees up in time
    pub fn get(&self) -> StorageResult<PooledConnection> {
        let conn = self.pool.get()?;
        debug!("Connection acquired");
        Ok(conn)
    }

    /// Run a trivial query to prove the database answers
    ///
    /// # Errors
    /// Returns the connection or query failure
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Get the database file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
