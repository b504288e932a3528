//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: RSA/EC key material and random identities
//! - **[`mocks`]**: In-memory implementations of the auth seams
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tiergate_common::auth::PublicKeyCache;
//! use tiergate_common::testing::{fixtures, MockKeyFetcher};
//!
//! let fetcher = Arc::new(MockKeyFetcher::new(fixtures::PUBLIC_KEY_A_PEM));
//! let cache = PublicKeyCache::new(fetcher);
//! # tokio_test::block_on(async {
//! assert!(!cache.cache_info().await.has_key);
//! # });
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{random_email, random_string};
#[cfg(feature = "platform")]
pub use mocks::MockKeychainProvider;
pub use mocks::{MockKeyFetcher, MockOAuthClient, MockTokenStore};
