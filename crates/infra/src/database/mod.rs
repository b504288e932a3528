//! Offline credential database

pub mod error;
pub mod manager;
pub mod offline_store;

pub use error::{OfflineResult, OfflineStoreError};
pub use manager::DbManager;
pub use offline_store::OfflineStore;
