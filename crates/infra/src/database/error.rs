//! Offline store errors

use thiserror::Error;
use tiergate_common::storage::StorageError;

/// Failures of the offline (tier 3) credential store
///
/// Unknown email and wrong password both surface as
/// [`OfflineStoreError::InvalidCredentials`].
#[derive(Debug, Error)]
pub enum OfflineStoreError {
    #[error("email cannot be empty")]
    EmptyEmail,

    #[error("password cannot be empty")]
    EmptyPassword,

    #[error("user already exists: {0}")]
    DuplicateEmail(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("refresh token expired")]
    RefreshExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("offline store task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for OfflineStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Rusqlite(err))
    }
}

impl From<bcrypt::BcryptError> for OfflineStoreError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Hash(err.to_string())
    }
}

/// Result alias for the offline store
pub type OfflineResult<T> = Result<T, OfflineStoreError>;
