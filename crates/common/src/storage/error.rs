//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),
}

impl StorageError {
    /// Whether retrying may succeed: pool exhaustion or a locked database.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::R2d2(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Whether the error is a UNIQUE or other constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Rusqlite(err)
                if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    //! Unit tests for storage::error.
    use super::*;

    /// Validates `StorageError::is_constraint_violation` behavior for the
    /// duplicate key scenario.
    ///
    /// Assertions:
    /// - Ensures a UNIQUE violation is classified as a constraint error.
    /// - Ensures it is not retryable.
    #[test]
    fn test_constraint_violation_classification() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StorageError =
            conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err().into();

        assert!(err.is_constraint_violation());
        assert!(!err.is_retryable());
    }
}
