// src/lib.rs
//! Local Overrides Engine Library
//!
//! Serves locally stored files and headers in place of live network
//! responses, and keeps the network and local copies of a resource in sync.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **overrides**: Path encoding, binding table, `.headers` resolution
//! - **interception**: Pattern controller, transport seam, request handler
//! - **workspace**: Projects (network and file system) and their event bus
//! - **settings**: Feature toggle and header-overrides flag
//! - **engine**: Service object tying the above together
//! - **observability**: Tracing and metrics setup
//! - **utils**: Configuration, errors, throttling

// Public module exports
pub mod engine;
pub mod interception;
pub mod observability;
pub mod overrides;
pub mod settings;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use engine::{OriginalContent, OverridesEngine};
pub use interception::{InterceptionDecision, InterceptionPattern, Transport};
pub use overrides::{Binding, EngineEvent, PathEncoder};
pub use settings::{Settings, SettingsEvent};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};
pub use workspace::{Project, ResourceHandle, Workspace};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
