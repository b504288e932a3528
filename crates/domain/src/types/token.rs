//! Token claim sets and the issued token pair
//!
//! Claim sets are immutable once signed: they are only ever produced by the
//! codec on issuance or by decoding a token.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::TOKEN_TYPE_BEARER;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub roles: Vec<String>,
    pub iss: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    /// Not-before, seconds since the Unix epoch
    pub nbf: i64,
    /// Expires-at, seconds since the Unix epoch
    pub exp: i64,
}

impl AccessTokenClaims {
    /// Expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Issuance as a UTC timestamp.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    /// Whether the claims name the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub session_id: String,
    pub iss: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl RefreshTokenClaims {
    /// Expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Access/refresh token pair as issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds, relative to receipt
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl TokenPair {
    /// Create a bearer token pair.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            token_type: default_token_type(),
        }
    }

    /// Whether a refresh token is present.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Absolute expiry computed from `expires_in` relative to `received_at`.
    ///
    /// Negative lifetimes count as already expired; lifetimes past the
    /// representable range saturate at `DateTime::<Utc>::MAX_UTC`.
    #[must_use]
    pub fn expires_at_from(&self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_seconds(self.expires_in.max(0))
            .and_then(|lifetime| received_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn default_token_type() -> String {
    TOKEN_TYPE_BEARER.to_string()
}

/// `aud` and `roles` may be a single string or an array of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
