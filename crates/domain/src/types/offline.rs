//! Offline (tier 3) user and session rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenPair;

/// Locally registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: i64,
    pub email: String,
    /// bcrypt hash, never the password itself
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Locally issued session. Replaced, never updated, on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSession {
    pub id: i64,
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LocalSession {
    /// Whether the session has lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Present the session in the same shape as identity-service tokens.
    #[must_use]
    pub fn to_token_pair(&self) -> TokenPair {
        let remaining = (self.expires_at - Utc::now()).num_seconds().max(0);
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone(), remaining)
    }
}
