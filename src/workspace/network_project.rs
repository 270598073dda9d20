// src/workspace/network_project.rs
//! In-memory network project
//!
//! Holds the resources observed over a live session. Each resource keeps the
//! content the server delivered plus an optional working copy, which is what
//! gets displayed and what content sync replaces.

use crate::utils::errors::{EngineError, Result};
use crate::workspace::{
    Project, ProjectId, ResourceContent, ResourceHandle, ResourceSpace, WorkspaceEvent,
};
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

struct NetworkResource {
    handle: ResourceHandle,
    content: ResourceContent,
    working_copy: Option<ResourceContent>,
}

impl NetworkResource {
    fn displayed(&self) -> &ResourceContent {
        self.working_copy.as_ref().unwrap_or(&self.content)
    }
}

/// Network resources of one session
pub struct NetworkProject {
    id: ProjectId,
    resources: RwLock<IndexMap<String, NetworkResource>>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl NetworkProject {
    pub fn new(id: ProjectId, events: broadcast::Sender<WorkspaceEvent>) -> Self {
        Self {
            id,
            resources: RwLock::new(IndexMap::new()),
            events,
        }
    }

    /// Record a resource delivered by the server and announce it
    pub fn add_resource(
        &self,
        url: impl Into<String>,
        mime_type: impl Into<String>,
        content: ResourceContent,
    ) -> ResourceHandle {
        let handle = ResourceHandle::network(self.id.clone(), url, mime_type)
            .with_encoded(content.encoded);

        debug!("Network resource added: {}", handle.location);

        self.resources.write().insert(
            handle.location.clone(),
            NetworkResource {
                handle: handle.clone(),
                content,
                working_copy: None,
            },
        );
        let _ = self.events.send(WorkspaceEvent::ResourceAdded(handle.clone()));
        handle
    }

    /// Forget a resource and announce it
    pub fn remove_resource(&self, url: &str) -> Option<ResourceHandle> {
        let removed = self.resources.write().shift_remove(url)?;
        let _ = self
            .events
            .send(WorkspaceEvent::ResourceRemoved(removed.handle.clone()));
        Some(removed.handle)
    }

    /// Commit an edit to a resource, e.g. from an editor view
    pub fn commit_working_copy(&self, url: &str, content: ResourceContent) -> Result<()> {
        let handle = {
            let mut resources = self.resources.write();
            let resource = resources
                .get_mut(url)
                .ok_or_else(|| EngineError::ResourceNotFound(url.to_string()))?;
            resource.working_copy = Some(content);
            resource.handle.clone()
        };

        let _ = self.events.send(WorkspaceEvent::WorkingCopyCommitted(handle));
        Ok(())
    }

    /// Content currently displayed for `url`
    pub fn displayed_content(&self, url: &str) -> Option<ResourceContent> {
        self.resources
            .read()
            .get(url)
            .map(|resource| resource.displayed().clone())
    }
}

#[async_trait]
impl Project for NetworkProject {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn space(&self) -> ResourceSpace {
        ResourceSpace::Network
    }

    fn resources(&self) -> Vec<ResourceHandle> {
        self.resources
            .read()
            .values()
            .map(|resource| resource.handle.clone())
            .collect()
    }

    fn resource_for_path(&self, location: &str) -> Option<ResourceHandle> {
        self.resources
            .read()
            .get(location)
            .map(|resource| resource.handle.clone())
    }

    async fn request_content(&self, handle: &ResourceHandle) -> Result<ResourceContent> {
        self.displayed_content(&handle.location)
            .ok_or_else(|| EngineError::ContentRead(format!("No content for {}", handle.location)))
    }

    async fn request_bytes(&self, handle: &ResourceHandle) -> Result<Bytes> {
        let content = self.request_content(handle).await?;
        Ok(Bytes::from(content.to_bytes()?))
    }

    async fn create_file(
        &self,
        dir: &str,
        name: &str,
        _content: &ResourceContent,
    ) -> Result<ResourceHandle> {
        Err(EngineError::FileCreation(format!(
            "Network project {} cannot create {}/{}",
            self.id, dir, name
        )))
    }

    async fn sync_content(
        &self,
        handle: &ResourceHandle,
        content: &ResourceContent,
    ) -> Result<()> {
        let mut resources = self.resources.write();
        let resource = resources
            .get_mut(&handle.location)
            .ok_or_else(|| EngineError::ResourceNotFound(handle.location.clone()))?;
        resource.working_copy = Some(content.clone());
        Ok(())
    }
}
