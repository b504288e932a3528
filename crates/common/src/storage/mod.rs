//! SQLite storage primitives
//!
//! Connection pooling and per-connection pragmas for the local databases.
//! Schemas belong to the adapters that own them; this module only opens and
//! hands out connections.

pub mod config;
pub mod error;
pub mod pool;

pub use config::SqlitePoolConfig;
pub use error::{StorageError, StorageResult};
pub use pool::{apply_connection_pragmas, PooledConnection, SqlitePool};
