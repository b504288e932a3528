//! Database manager for the offline store's SQLite file.

use std::path::Path;

use rusqlite::params;
use tiergate_common::storage::{PooledConnection, SqlitePool, SqlitePoolConfig};
use tiergate_domain::{Result, TiergateError};
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Owns the connection pool and the schema
#[derive(Debug, Clone)]
pub struct DbManager {
    pool: SqlitePool,
}

impl DbManager {
    /// Open the database at `db_path`, creating the file and its directory
    /// when missing.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if the pool cannot be created
    pub fn new<P: AsRef<Path>>(db_path: P, config: &SqlitePoolConfig) -> Result<Self> {
        let pool = SqlitePool::open(db_path.as_ref(), config).map_err(map_infra)?;
        info!(db_path = %pool.path().display(), "Offline database opened");
        Ok(Self { pool })
    }

    /// Open and migrate in one step, with a single pooled connection so
    /// every statement is serialized.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if opening or migrating fails
    pub fn open_migrated<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let manager = Self::new(db_path, &SqlitePoolConfig::default().with_max_size(1))?;
        manager.run_migrations()?;
        Ok(manager)
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check out a connection.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if the pool is exhausted
    pub fn get_connection(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(map_infra)
    }

    /// Ensure the schema exists and record its version.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if a statement fails
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_infra)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(map_infra)?;
        Ok(())
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.pool.path()
    }

    /// Verify the database answers a trivial query.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if the query fails
    pub fn health_check(&self) -> Result<()> {
        self.pool.health_check().map_err(map_infra)
    }
}

fn map_infra<E>(err: E) -> TiergateError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn migrations_create_schema_version() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::open_migrated(temp_dir.path().join("offline.db")).unwrap();

        let conn = manager.get_connection().unwrap();
        let version: i32 =
            conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::open_migrated(temp_dir.path().join("offline.db")).unwrap();

        manager.run_migrations().unwrap();

        let conn = manager.get_connection().unwrap();
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(rows, 1);
        drop(conn);
        manager.health_check().unwrap();
    }

    #[test]
    fn invalid_pool_config_is_a_config_error() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let config = SqlitePoolConfig::default().with_max_size(0);

        let result = DbManager::new(temp_dir.path().join("offline.db"), &config);
        assert!(matches!(result, Err(TiergateError::Config(_))));
    }
}
