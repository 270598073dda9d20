// src/interception/mod.rs
//! Request interception layer
//!
//! - **Transport**: Seam to the physical request capture
//! - **Pattern Controller**: Which URLs are routed to the engine
//! - **Handler**: What happens to a routed request
//! - **Resource Type**: Request categories and MIME classification
//!
//! # Architecture
//!
//! ```text
//! overrides project files ──→ PatternController ──patterns──→ Transport
//!                                                                │
//!                        continue_with_content ←── handler ←── paused request
//! ```

pub mod handler;
pub mod pattern_controller;
pub mod resource_type;
pub mod transport;

// Re-export commonly used types
pub use handler::{
    resolve_mime_type, InterceptedContent, InterceptedRequest, InterceptionDecision,
    ResponseBody,
};
pub use pattern_controller::{pattern_for_file_system_resource, PatternController};
pub use resource_type::{mime_type_for_path, ResourceType};
pub use transport::{InterceptionPattern, InterceptionStage, LoggingTransport, Transport};
