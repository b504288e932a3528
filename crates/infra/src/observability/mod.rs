//! Tracing subscriber setup

pub mod logging;

pub use logging::{init_tracing, LOG_ENV_VAR};
