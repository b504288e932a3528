//! Tier wiring from configuration

pub mod service;

pub use service::{
    credential_store, oauth_client, refresh_manager, AuthIdentity, TieredAuthenticator,
};
