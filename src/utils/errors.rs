// src/utils/errors.rs
//! Error types for the overrides engine
//!
//! None of these are fatal to the process. Callers inside the engine log them
//! and abandon the single resource or request that failed.

use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// A `.headers` declarations file failed to parse or validate
    #[error("Malformed header overrides file {path}: {reason}")]
    MalformedOverrideFile { path: String, reason: String },

    /// Reading resource content failed
    #[error("Content read failed: {0}")]
    ContentRead(String),

    /// Creating a file inside the overrides project failed
    #[error("File creation failed: {0}")]
    FileCreation(String),

    /// No project registered under the given id
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// No resource at the given location
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The transport rejected a pattern update or a continue request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression built from an override declaration
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Invalid base64 content
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
