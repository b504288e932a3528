//! Credential storage layered on top of the keychain provider.
//!
//! - **`security::keychain`**: generic secret storage in the platform keychain
//! - **`auth::keychain`** (this module): fixed credential keys for the CLI's
//!   tokens, API key and user email
//!
//! The token pair is stored twice: as one JSON entry and as the two bare
//! token strings, so older readers that only know `access_token` keep
//! working. Missing entries read as `None`.

use async_trait::async_trait;
use tiergate_domain::constants::{
    KEY_ACCESS_TOKEN, KEY_API_KEY, KEY_REFRESH_TOKEN, KEY_TOKEN_PAIR, KEY_USER_EMAIL,
};
use tiergate_domain::TokenPair;
use tracing::{debug, instrument};

use super::traits::TokenStore;
use crate::security::{KeychainError, KeychainTrait};

const ALL_KEYS: [&str; 5] =
    [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_TOKEN_PAIR, KEY_API_KEY, KEY_USER_EMAIL];

/// Typed access to the CLI's stored credentials
#[derive(Debug, Clone)]
pub struct CredentialStore<K: KeychainTrait> {
    keychain: K,
}

impl<K: KeychainTrait> CredentialStore<K> {
    /// Wrap a keychain backend.
    pub const fn new(keychain: K) -> Self {
        Self { keychain }
    }

    /// Get the underlying keychain.
    #[must_use]
    pub const fn keychain(&self) -> &K {
        &self.keychain
    }

    /// Persist a token pair as JSON plus the individual tokens
    ///
    /// # Errors
    /// Returns error if serialization or any keychain write fails
    #[instrument(skip_all)]
    pub fn store_token_pair(&self, tokens: &TokenPair) -> Result<(), KeychainError> {
        let json = serde_json::to_string(tokens)?;
        self.keychain.set_secret(KEY_TOKEN_PAIR, &json)?;
        self.keychain.set_secret(KEY_ACCESS_TOKEN, &tokens.access_token)?;
        if tokens.has_refresh_token() {
            self.keychain.set_secret(KEY_REFRESH_TOKEN, &tokens.refresh_token)?;
        }
        debug!("Token pair stored");
        Ok(())
    }

    /// Load the stored token pair
    ///
    /// # Errors
    /// Returns error if the keychain fails or the stored JSON is corrupt
    pub fn load_token_pair(&self) -> Result<Option<TokenPair>, KeychainError> {
        match self.read(KEY_TOKEN_PAIR)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete the token pair and both bare tokens
    ///
    /// # Errors
    /// Returns error if a keychain delete fails
    pub fn delete_tokens(&self) -> Result<(), KeychainError> {
        for key in [KEY_TOKEN_PAIR, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN] {
            self.keychain.delete_secret(key)?;
        }
        Ok(())
    }

    /// Read the bare access token
    ///
    /// # Errors
    /// Returns error if the keychain fails
    pub fn access_token(&self) -> Result<Option<String>, KeychainError> {
        self.read(KEY_ACCESS_TOKEN)
    }

    /// Read the bare refresh token
    ///
    /// # Errors
    /// Returns error if the keychain fails
    pub fn refresh_token(&self) -> Result<Option<String>, KeychainError> {
        self.read(KEY_REFRESH_TOKEN)
    }

    /// Store the API key
    ///
    /// # Errors
    /// Returns error if the keychain write fails
    pub fn set_api_key(&self, api_key: &str) -> Result<(), KeychainError> {
        self.keychain.set_secret(KEY_API_KEY, api_key)
    }

    /// Read the API key
    ///
    /// # Errors
    /// Returns error if the keychain fails
    pub fn api_key(&self) -> Result<Option<String>, KeychainError> {
        self.read(KEY_API_KEY)
    }

    /// Delete the API key
    ///
    /// # Errors
    /// Returns error if the keychain delete fails
    pub fn delete_api_key(&self) -> Result<(), KeychainError> {
        self.keychain.delete_secret(KEY_API_KEY)
    }

    /// Store the signed-in user's email
    ///
    /// # Errors
    /// Returns error if the keychain write fails
    pub fn set_user_email(&self, email: &str) -> Result<(), KeychainError> {
        self.keychain.set_secret(KEY_USER_EMAIL, email)
    }

    /// Read the signed-in user's email
    ///
    /// # Errors
    /// Returns error if the keychain fails
    pub fn user_email(&self) -> Result<Option<String>, KeychainError> {
        self.read(KEY_USER_EMAIL)
    }

    /// Whether any credential is stored
    #[must_use]
    pub fn exists(&self) -> bool {
        ALL_KEYS.iter().any(|key| self.keychain.secret_exists(key))
    }

    /// Delete every stored credential (idempotent)
    ///
    /// # Errors
    /// Returns the first keychain failure
    #[instrument(skip_all)]
    pub fn delete_all(&self) -> Result<(), KeychainError> {
        for key in ALL_KEYS {
            self.keychain.delete_secret(key)?;
        }
        debug!("All credentials deleted");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, KeychainError> {
        match self.keychain.get_secret(key) {
            Ok(value) => Ok(Some(value)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<K: KeychainTrait> TokenStore for CredentialStore<K> {
    async fn store_tokens(&self, tokens: &TokenPair) -> Result<(), String> {
        self.store_token_pair(tokens).map_err(|e| e.to_string())
    }
}
