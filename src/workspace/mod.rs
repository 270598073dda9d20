// src/workspace/mod.rs
//! Resource spaces and the projects that own them
//!
//! The engine sees two kinds of projects:
//!
//! - **Network projects**: resources observed over a live session, keyed by URL
//! - **File system projects**: local files, keyed by `/`-separated relative path;
//!   at most one of type `overrides` is the active overrides root
//!
//! Projects publish add/remove/rename/commit notifications on the workspace
//! event bus. Subscribers (the overrides engine) react to them; they never
//! poll project internals.
//!
//! # Architecture
//!
//! ```text
//! NetworkProject ──┐
//!                  ├─ WorkspaceEvent (broadcast) ──→ OverridesEngine
//! FileSystemProject┘
//! ```

pub mod fs_project;
pub mod network_project;

pub use fs_project::FileSystemProject;
pub use network_project::NetworkProject;

use crate::utils::errors::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the workspace event bus
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Project identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which space a resource lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceSpace {
    Network,
    FileSystem,
}

/// Identity of a resource handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub project_id: ProjectId,
    pub location: String,
}

/// Reference to a document in one of the two resource spaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    /// Owning project
    pub project_id: ProjectId,

    /// Network or file system
    pub space: ResourceSpace,

    /// URL (network) or relative path (file system)
    pub location: String,

    /// MIME type as known by the owning project
    pub mime_type: String,

    /// Whether the content is stored base64-encoded
    pub content_encoded: bool,
}

impl ResourceHandle {
    /// Handle for a network resource
    pub fn network(
        project_id: ProjectId,
        url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            space: ResourceSpace::Network,
            location: url.into(),
            mime_type: mime_type.into(),
            content_encoded: false,
        }
    }

    /// Handle for a file inside a file system project
    pub fn file_system(
        project_id: ProjectId,
        relative_path: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            space: ResourceSpace::FileSystem,
            location: relative_path.into(),
            mime_type: mime_type.into(),
            content_encoded: false,
        }
    }

    pub fn with_encoded(mut self, encoded: bool) -> Self {
        self.content_encoded = encoded;
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            project_id: self.project_id.clone(),
            location: self.location.clone(),
        }
    }

    pub fn is_network(&self) -> bool {
        self.space == ResourceSpace::Network
    }

    /// URL for network handles, relative path for file system handles
    pub fn url(&self) -> &str {
        &self.location
    }

    /// Relative path split into segments
    pub fn relative_path_parts(&self) -> Vec<&str> {
        self.location.split('/').collect()
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }
}

/// Resource content as text, base64-encoded when `encoded` is set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceContent {
    pub content: String,
    pub encoded: bool,
}

impl ResourceContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            encoded: false,
        }
    }

    pub fn base64(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            encoded: true,
        }
    }

    /// UTF-8 text stays plain; anything else is base64-encoded
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::text(text),
            Err(_) => Self::base64(STANDARD.encode(bytes)),
        }
    }

    /// Raw bytes of the content
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.encoded {
            Ok(STANDARD.decode(self.content.as_bytes())?)
        } else {
            Ok(self.content.as_bytes().to_vec())
        }
    }
}

/// Project contract consumed by the engine
#[async_trait]
pub trait Project: Send + Sync {
    fn id(&self) -> &ProjectId;

    fn space(&self) -> ResourceSpace;

    /// Whether this is a file system project of type `overrides`
    fn is_overrides(&self) -> bool {
        false
    }

    /// Root directory on disk, empty for network projects
    fn root_path(&self) -> String {
        String::new()
    }

    /// All resources currently in the project
    fn resources(&self) -> Vec<ResourceHandle>;

    /// Locate a resource by URL (network) or relative path (file system)
    fn resource_for_path(&self, location: &str) -> Option<ResourceHandle>;

    /// Content and encoding as currently displayed
    async fn request_content(&self, handle: &ResourceHandle) -> Result<ResourceContent>;

    /// Raw bytes
    async fn request_bytes(&self, handle: &ResourceHandle) -> Result<Bytes>;

    /// Create a file at `dir/name` holding `content`
    async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &ResourceContent,
    ) -> Result<ResourceHandle>;

    /// Replace the displayed content of `handle` with `content`
    async fn sync_content(&self, handle: &ResourceHandle, content: &ResourceContent)
        -> Result<()>;
}

/// Notifications published on the workspace bus
#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    ProjectAdded(ProjectId),
    ProjectRemoved(ProjectId),
    ResourceAdded(ResourceHandle),
    ResourceRemoved(ResourceHandle),
    ResourceRenamed {
        old: ResourceHandle,
        new: ResourceHandle,
    },
    WorkingCopyCommitted(ResourceHandle),
}

/// Registry of projects plus the event bus they publish on
pub struct Workspace {
    projects: RwLock<IndexMap<ProjectId, Arc<dyn Project>>>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl Workspace {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            projects: RwLock::new(IndexMap::new()),
            events,
        }
    }

    /// Sender handed to projects so they can publish resource events
    pub fn event_sender(&self) -> broadcast::Sender<WorkspaceEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    /// Register a project and announce it
    pub fn add_project(&self, project: Arc<dyn Project>) {
        let id = project.id().clone();
        info!("Project added: {} ({:?})", id, project.space());
        self.projects.write().insert(id.clone(), project);
        let _ = self.events.send(WorkspaceEvent::ProjectAdded(id));
    }

    /// Unregister a project and announce it
    pub fn remove_project(&self, id: &ProjectId) -> Option<Arc<dyn Project>> {
        let removed = self.projects.write().shift_remove(id);
        if removed.is_some() {
            info!("Project removed: {}", id);
            let _ = self.events.send(WorkspaceEvent::ProjectRemoved(id.clone()));
        } else {
            debug!("Ignoring removal of unknown project {}", id);
        }
        removed
    }

    pub fn project(&self, id: &ProjectId) -> Option<Arc<dyn Project>> {
        self.projects.read().get(id).cloned()
    }

    /// Owning project of a handle
    pub fn project_for(&self, handle: &ResourceHandle) -> Option<Arc<dyn Project>> {
        self.project(&handle.project_id)
    }

    pub fn projects_for_space(&self, space: ResourceSpace) -> Vec<Arc<dyn Project>> {
        self.projects
            .read()
            .values()
            .filter(|project| project.space() == space)
            .cloned()
            .collect()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_name_and_parts() {
        let handle = ResourceHandle::file_system(
            ProjectId::new("ovr"),
            "example.com/css/site.css",
            "text/css",
        );
        assert_eq!(handle.name(), "site.css");
        assert_eq!(handle.relative_path_parts(), vec!["example.com", "css", "site.css"]);
        assert!(!handle.is_network());
    }

    #[test]
    fn test_content_from_bytes() {
        let text = ResourceContent::from_bytes(b"body { }");
        assert!(!text.encoded);
        assert_eq!(text.to_bytes().unwrap(), b"body { }");

        let binary = ResourceContent::from_bytes(&[0xff, 0x00, 0xfe]);
        assert!(binary.encoded);
        assert_eq!(binary.to_bytes().unwrap(), vec![0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_project_registration_events() {
        let workspace = Workspace::new();
        let mut events = workspace.subscribe();

        let project = Arc::new(NetworkProject::new(
            ProjectId::new("net"),
            workspace.event_sender(),
        ));
        workspace.add_project(project);

        assert!(matches!(
            events.recv().await.unwrap(),
            WorkspaceEvent::ProjectAdded(id) if id.as_str() == "net"
        ));
        assert_eq!(workspace.projects_for_space(ResourceSpace::Network).len(), 1);

        workspace.remove_project(&ProjectId::new("net"));
        assert!(matches!(
            events.recv().await.unwrap(),
            WorkspaceEvent::ProjectRemoved(_)
        ));
        assert!(workspace.project(&ProjectId::new("net")).is_none());
    }
}
