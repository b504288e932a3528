//! Platform secret storage
//!
//! Thin wrapper over the OS keychain. Token-specific helpers live in
//! `auth::keychain` so this module stays free of auth types.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider, KeychainTrait};
