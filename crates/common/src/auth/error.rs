//! Error taxonomy for token handling and validation
//!
//! Variants are grouped the way callers need to react to them: malformed
//! input and cryptographic rejection are final, expiry can be fixed by a
//! renewal, transport failures are recovered by falling back a tier.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Token, key and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token could not be parsed (bad segments, base64 or JSON)
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Key material is not a supported PEM container
    #[error("invalid key format: {0}")]
    KeyFormat(String),

    /// Signature, algorithm, issuer or audience check failed
    #[error("token rejected: {0}")]
    Rejected(String),

    /// Required claim missing or empty
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Token is past its `exp` claim
    #[error("token has expired")]
    Expired {
        /// Expiry read from the (unverified) claims, when available
        expires_at: Option<DateTime<Utc>>,
    },

    /// Token has no `exp` claim
    #[error("token has no expiration")]
    MissingExpiration,

    /// Signing a new token failed
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// Public key could not be obtained
    #[error("failed to fetch public key: {0}")]
    KeyFetch(String),

    /// Remote validation tier was unreachable or answered unusably
    #[error("identity service unavailable: {0}")]
    Transport(String),

    /// Remote validation tier answered `valid=false`
    #[error("token validation failed: {0}")]
    RemoteRejected(String),

    /// Remote tier unreachable and local validation also failed
    #[error("all validation tiers failed (remote: {remote}; local: {local})")]
    FallbackExhausted {
        /// Why the remote tier was skipped
        remote: String,
        /// Error from the local tier
        local: Box<AuthError>,
    },

    /// Custom cache invalidation hook reported an error
    #[error("cache invalidation hook failed: {0}")]
    InvalidationHook(String),
}

impl AuthError {
    /// Whether the token only needs renewing rather than re-authentication.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self {
            Self::Expired { .. } => true,
            Self::FallbackExhausted { local, .. } => local.is_expired(),
            _ => false,
        }
    }

    /// Whether the failure came from an unreachable network tier.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) | Self::KeyFetch(_) => true,
            Self::FallbackExhausted { local, .. } => local.is_transport(),
            _ => false,
        }
    }

    /// Expiry carried by an `Expired` error.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Expired { expires_at } => *expires_at,
            Self::FallbackExhausted { local, .. } => local.expires_at(),
            _ => None,
        }
    }
}

/// Result alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;
