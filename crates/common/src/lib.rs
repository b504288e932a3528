//! Token lifecycle primitives shared across Tiergate crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: pure helpers without side effects: PKCE generation and
//!   the `AuthError` taxonomy
//! - `runtime`: token codec, key cache, validators, refresh manager,
//!   OAuth client
//! - `platform`: OS keychain, credential store and SQLite pool integrations
//!
//! Mocks and key fixtures for downstream tests live in [`testing`] and come
//! with the `runtime` tier.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier (runtime adds the rest of `auth`)
// --------------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;
#[cfg(feature = "platform")]
pub mod storage;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use auth::{AuthError, AuthResult, PkceParams};
#[cfg(feature = "runtime")]
pub use auth::{
    KeyFetcher, LocalValidator, OAuthClient, PublicKeyCache, RefreshManager, TokenValidator,
    ValidationOutcome,
};
#[cfg(feature = "platform")]
pub use auth::CredentialStore;
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, KeychainTrait};
#[cfg(feature = "platform")]
pub use storage::{SqlitePool, StorageError, StorageResult};
