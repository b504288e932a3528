//! Conversions from adapter and component errors into [`TiergateError`].
//!
//! Component crates keep precise error enums; callers at the service
//! boundary only see the domain error. Every mapping lives here so the
//! classification (auth vs network vs expired) is decided in one place.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tiergate_common::auth::{AuthError, OAuthClientError, RefreshError};
use tiergate_common::security::KeychainError;
use tiergate_common::storage::StorageError;
use tiergate_domain::TiergateError;

use crate::database::OfflineStoreError;

/// Newtype that keeps the conversions on the infrastructure side
#[derive(Debug)]
pub struct InfraError(pub TiergateError);

impl From<InfraError> for TiergateError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TiergateError> for InfraError {
    fn from(value: TiergateError) -> Self {
        Self(value)
    }
}

trait IntoTiergateError {
    fn into_tiergate(self) -> TiergateError;
}

macro_rules! infra_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for InfraError {
                fn from(value: $source) -> Self {
                    Self(value.into_tiergate())
                }
            }
        )+
    };
}

infra_from!(
    SqlError,
    KeyringError,
    HttpError,
    AuthError,
    OAuthClientError,
    RefreshError,
    KeychainError,
    StorageError,
    OfflineStoreError,
);

/* -------------------------------------------------------------------------- */
/* rusqlite / storage */
/* -------------------------------------------------------------------------- */

impl IntoTiergateError for SqlError {
    fn into_tiergate(self) -> TiergateError {
        use rusqlite::ffi::ErrorCode;

        match self {
            Self::SqliteFailure(err, message) => match (err.code, err.extended_code) {
                (ErrorCode::DatabaseBusy, _) => TiergateError::Database("database is busy".into()),
                (ErrorCode::DatabaseLocked, _) => {
                    TiergateError::Database("database is locked".into())
                }
                (ErrorCode::ConstraintViolation, 2067) => {
                    TiergateError::Database("unique constraint violation".into())
                }
                (ErrorCode::ConstraintViolation, 787) => {
                    TiergateError::Database("foreign key constraint violation".into())
                }
                (code, extended) => TiergateError::Database(format!(
                    "sqlite failure {code:?} (code {extended}): {}",
                    message.unwrap_or_default()
                )),
            },
            Self::QueryReturnedNoRows => TiergateError::NotFound("no rows returned by query".into()),
            Self::InvalidPath(path) => {
                TiergateError::Database(format!("invalid database path: {}", path.display()))
            }
            other => TiergateError::Database(other.to_string()),
        }
    }
}

impl IntoTiergateError for StorageError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::Rusqlite(err) => err.into_tiergate(),
            Self::R2d2(err) => {
                TiergateError::Database(format!("no database connection available: {err}"))
            }
            Self::InvalidConfig(msg) => TiergateError::Config(msg),
            other => TiergateError::Database(other.to_string()),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* keychain */
/* -------------------------------------------------------------------------- */

impl IntoTiergateError for KeyringError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::NoEntry => TiergateError::NotFound("keychain entry not found".into()),
            Self::BadEncoding(_) => {
                TiergateError::Security("credential in keychain is not valid UTF-8".into())
            }
            Self::NoStorageAccess(err) => {
                TiergateError::Security(format!("unable to access secure storage: {err}"))
            }
            Self::PlatformFailure(err) => {
                TiergateError::Security(format!("keychain platform error: {err}"))
            }
            other => TiergateError::Security(other.to_string()),
        }
    }
}

impl IntoTiergateError for KeychainError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::NotFound => TiergateError::NotFound("keychain entry not found".into()),
            Self::Keyring(err) => err.into_tiergate(),
            Self::Serialization(err) => {
                TiergateError::Security(format!("stored credential is corrupt: {err}"))
            }
            Self::AccessFailed(msg) => TiergateError::Security(msg),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest */
/* -------------------------------------------------------------------------- */

fn status_error(code: u16, message: String) -> TiergateError {
    match code {
        401 | 403 => TiergateError::Auth(message),
        404 => TiergateError::NotFound(message),
        429 => TiergateError::Network(message),
        400..=499 => TiergateError::InvalidInput(message),
        _ => TiergateError::Network(message),
    }
}

impl IntoTiergateError for HttpError {
    fn into_tiergate(self) -> TiergateError {
        if self.is_timeout() {
            return TiergateError::Network("HTTP request timed out".into());
        }
        if self.is_connect() {
            return TiergateError::Network("HTTP connection failure".into());
        }
        if let Some(status) = self.status() {
            let message = format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            );
            return status_error(status.as_u16(), message);
        }
        TiergateError::Network(self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* auth components */
/* -------------------------------------------------------------------------- */

impl IntoTiergateError for AuthError {
    fn into_tiergate(self) -> TiergateError {
        if self.is_expired() {
            return TiergateError::Expired(self.to_string());
        }
        if self.is_transport() {
            return TiergateError::Network(self.to_string());
        }
        match self {
            Self::KeyFormat(_) | Self::Signing(_) => TiergateError::Security(self.to_string()),
            Self::InvalidationHook(_) => TiergateError::Internal(self.to_string()),
            other => TiergateError::Auth(other.to_string()),
        }
    }
}

impl IntoTiergateError for OAuthClientError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::RequestFailed(err) => err.into_tiergate(),
            Self::Status { status, .. } => status_error(status, self.to_string()),
            Self::OAuthError(_) | Self::NoRefreshToken => TiergateError::Auth(self.to_string()),
            Self::ConfigError(msg) => TiergateError::Config(msg),
            Self::Pkce(_) => TiergateError::InvalidInput(self.to_string()),
            Self::ParseError(_) => TiergateError::Internal(self.to_string()),
        }
    }
}

impl IntoTiergateError for RefreshError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::MissingTokens => TiergateError::InvalidInput(self.to_string()),
            Self::AlreadyRunning | Self::Cancelled => TiergateError::Internal(self.to_string()),
            Self::NoRefreshToken | Self::ReauthRequired(_) => TiergateError::Auth(self.to_string()),
            Self::OAuth(err) => err.into_tiergate(),
        }
    }
}

impl IntoTiergateError for OfflineStoreError {
    fn into_tiergate(self) -> TiergateError {
        match self {
            Self::EmptyEmail | Self::EmptyPassword | Self::DuplicateEmail(_) => {
                TiergateError::InvalidInput(self.to_string())
            }
            Self::InvalidCredentials | Self::InvalidToken | Self::InvalidRefreshToken => {
                TiergateError::Auth(self.to_string())
            }
            Self::TokenExpired | Self::RefreshExpired => TiergateError::Expired(self.to_string()),
            Self::UserNotFound => TiergateError::NotFound(self.to_string()),
            Self::Hash(_) => TiergateError::Security(self.to_string()),
            Self::Storage(err) => err.into_tiergate(),
            Self::Task(_) => TiergateError::Internal(self.to_string()),
        }
    }
}
