//! Token lifecycle and tiered validation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  TokenValidator  │  Seam used by callers
//! └────────┬─────────┘
//!          │
//!          ├──► LocalValidator    (signature checks, tier 2)
//!          │         │
//!          │         └──► PublicKeyCache ──► KeyFetcher (remote key endpoint)
//!          │
//!          └──► RefreshManager    (background renewal)
//!                    │
//!                    ├──► OAuthClient      (refresh grant, PKCE login)
//!                    └──► TokenStore       (CredentialStore over the keychain)
//! ```
//!
//! The remote tier-1 validator and the offline tier-3 store are I/O adapters
//! and live in `tiergate-infra`.
//!
//! # Module Organization
//!
//! Only [`error`] and [`pkce`] are pure and ship with the `foundation` tier;
//! everything else needs `runtime`.
//!
//! - **[`error`]**: `AuthError` taxonomy
//! - **[`codec`]**: RS256 token creation and verification
//! - **[`keys`]**: PEM parsing for verification and signing keys
//! - **[`pkce`]**: PKCE verifier, challenge and state generation
//! - **[`key_cache`]**: Public-key cache with refresh-ahead
//! - **[`validator`]**: `TokenValidator` seam and the local validator
//! - **[`client`]**: OAuth HTTP client for authorization and token exchange
//! - **[`refresh`]**: Background token renewal
//!
//! # Security Features
//!
//! - **Algorithm pinning**: only RS256 tokens are accepted
//! - **PKCE**: S256 challenges with rejection-sampled verifiers
//! - **Constant-time comparison**: state values are compared without early
//!   exit
//! - **No client secrets**: safe for a public CLI client

pub mod error;
pub mod pkce;

#[cfg(feature = "runtime")]
pub mod client;
#[cfg(feature = "runtime")]
pub mod codec;
#[cfg(feature = "runtime")]
pub mod key_cache;
#[cfg(feature = "platform")]
pub mod keychain;
#[cfg(feature = "runtime")]
pub mod keys;
#[cfg(feature = "runtime")]
pub mod refresh;
#[cfg(feature = "runtime")]
pub mod traits;
#[cfg(feature = "runtime")]
pub mod types;
#[cfg(feature = "runtime")]
pub mod validator;

pub use error::{AuthError, AuthResult};
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, validate_state, PkceError,
    PkceParams,
};

#[cfg(feature = "runtime")]
pub use client::{OAuthClient, OAuthClientError};
#[cfg(feature = "runtime")]
pub use key_cache::{
    InvalidateHook, KeyCacheConfig, KeyCacheInfo, KeyFetcher, PublicKeyCache,
};
#[cfg(feature = "platform")]
pub use keychain::CredentialStore;
#[cfg(feature = "runtime")]
pub use keys::{parse_public_key_pem, KeyEncoding, VerificationKey};
#[cfg(feature = "runtime")]
pub use refresh::{RefreshConfig, RefreshError, RefreshManager, RefreshStatus};
#[cfg(feature = "runtime")]
pub use traits::{OAuthClientTrait, TokenStore};
#[cfg(feature = "runtime")]
pub use types::{OAuthConfig, OAuthError, TokenResponse, ValidationOutcome};
#[cfg(feature = "runtime")]
pub use validator::{LocalValidator, TokenValidator};
