// src/overrides/mod.rs
//! Local overrides core
//!
//! - **Path Encoder**: URL → file system legal relative path
//! - **Header Overrides**: `.headers` parsing and hierarchical resolution
//! - **Bindings**: network ↔ file system binding table and content sync
//!
//! # Architecture
//!
//! ```text
//! network URL ──→ PathEncoder ──→ encoded path ──┬─→ BindingManager ──→ content sync
//!                                                └─→ HeaderOverrideResolver ──→ headers
//! ```

pub mod bindings;
pub mod header_overrides;
pub mod path_encoder;

pub use bindings::{Binding, BindingManager};
pub use header_overrides::{
    Header, HeaderOverrideResolver, HeaderOverrideRule, ParsedHeaderOverrides, HEADERS_FILENAME,
};
pub use path_encoder::PathEncoder;

use crate::workspace::ProjectId;

/// Notifications published by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Active overrides project changed (or was cleared)
    ProjectChanged(Option<ProjectId>),

    BindingCreated(Binding),

    BindingRemoved(Binding),

    /// A save-for-override wrote `dir/name` into the active project
    FileCreated { dir: String, name: String },

    /// A pattern set of the given size was submitted to the transport
    PatternsUpdated(usize),
}
