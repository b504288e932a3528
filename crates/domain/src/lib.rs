//! # Tiergate Domain
//!
//! Domain types for tiered token authentication.
//!
//! This crate contains:
//! - Token claim sets and token pairs
//! - Offline user and session rows
//! - Domain error types and Result definitions
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other Tiergate crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
