//! Keychain provider for secure credential storage
//!
//! Stores arbitrary strings in the platform keychain: macOS Keychain, Windows
//! Credential Manager, or the Secret Service API on Linux.
//!
//! ## Usage
//!
//! ```no_run
//! use tiergate_common::security::{KeychainProvider, KeychainTrait};
//!
//! let keychain = KeychainProvider::new("ainative-code");
//! keychain.set_secret("api_key", "super-secret")?;
//! assert_eq!(keychain.get_secret("api_key")?, "super-secret");
//! # Ok::<(), tiergate_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Secret storage operations
///
/// Implemented by [`KeychainProvider`] for the OS keychain and by
/// `testing::MockKeychainProvider` for tests.
pub trait KeychainTrait: Send + Sync {
    /// Store a secret, replacing any previous value
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the backend refuses the write
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read a secret
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if the key was never stored
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Delete a secret; deleting a missing key succeeds
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the backend refuses the delete
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Check if a secret is stored
    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}

/// Keychain provider scoped to one service name
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Examples
    /// ```
    /// use tiergate_common::security::KeychainProvider;
    ///
    /// let keychain = KeychainProvider::new("ainative-code");
    /// assert_eq!(keychain.service_name(), "ainative-code");
    /// ```
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Get the service name entries are filed under
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn create_entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to open keychain entry {key}: {e}"))
        })
    }
}

impl KeychainTrait for KeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            other => KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {key}: {other}"
            )),
        })
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found
    #[error("Entry not found")]
    NotFound,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Keyring error
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}
