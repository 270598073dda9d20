// src/utils/mod.rs
//! Common utilities and helpers
//!
//! - **Config**: Layered engine configuration (defaults, file, environment)
//! - **Errors**: Engine-wide error type and `Result` alias
//! - **Throttler**: Trailing-edge coalescing of bursty async work

pub mod config;
pub mod errors;
pub mod throttler;

pub use config::{EngineConfig, LoggingConfig, OverridesConfig};
pub use errors::{EngineError, Result};
pub use throttler::Throttler;
