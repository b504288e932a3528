//! # Tiergate Infrastructure
//!
//! I/O-bound adapters around the token lifecycle core in `tiergate-common`.
//!
//! This crate contains:
//! - Identity service adapters (remote validator, public-key fetcher)
//! - HTTP client with timeout and retry
//! - Offline credential store (SQLite + bcrypt)
//! - Tier wiring, configuration loading and logging initialisation
//!
//! ## Architecture
//! - Implements the `TokenValidator` and `KeyFetcher` seams from
//!   `tiergate-common`
//! - Depends on `tiergate-domain` for configuration and `TiergateError`
//! - Contains all "impure" code (network, database, environment)

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{RemoteKeyFetcher, RemoteValidator};
pub use auth::{AuthIdentity, TieredAuthenticator};
pub use database::{DbManager, OfflineStore, OfflineStoreError};
pub use errors::InfraError;
pub use http::HttpClient;
pub use observability::init_tracing;
