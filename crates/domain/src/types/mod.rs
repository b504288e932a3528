//! Domain types shared across crates

pub mod offline;
pub mod token;

pub use offline::{LocalSession, LocalUser};
pub use token::{AccessTokenClaims, RefreshTokenClaims, TokenPair};
