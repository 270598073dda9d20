// src/workspace/fs_project.rs
//! Overrides project backed by a local directory
//!
//! Files are indexed by their `/`-separated path relative to the project
//! root. Mutations made through the project (create, delete, rename) are
//! published on the workspace bus; changes made behind its back are picked up
//! by `rescan()`.

use crate::interception::resource_type::mime_type_for_path;
use crate::utils::errors::{EngineError, Result};
use crate::workspace::{
    Project, ProjectId, ResourceContent, ResourceHandle, ResourceSpace, WorkspaceEvent,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// File system project of type `overrides`
pub struct FileSystemProject {
    id: ProjectId,
    root: PathBuf,
    resources: RwLock<BTreeMap<String, ResourceHandle>>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl FileSystemProject {
    /// Open (creating if needed) and index the directory at `root`
    pub async fn open(
        id: ProjectId,
        root: impl Into<PathBuf>,
        events: broadcast::Sender<WorkspaceEvent>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let project = Self {
            id,
            root,
            resources: RwLock::new(BTreeMap::new()),
            events,
        };
        let count = project.scan().await?.len();

        info!("Opened overrides project at {:?} ({} files)", project.root, count);
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-index the directory, announcing files that appeared or vanished
    pub async fn rescan(&self) -> Result<()> {
        let found = self.scan_paths().await?;

        let (added, removed) = {
            let mut resources = self.resources.write();
            let removed: Vec<ResourceHandle> = resources
                .iter()
                .filter(|(path, _)| !found.contains(path))
                .map(|(_, handle)| handle.clone())
                .collect();
            for handle in &removed {
                resources.remove(&handle.location);
            }

            let mut added = Vec::new();
            for path in found {
                if !resources.contains_key(&path) {
                    let handle = self.handle_for(&path);
                    resources.insert(path, handle.clone());
                    added.push(handle);
                }
            }
            (added, removed)
        };

        debug!(
            "Rescanned {:?}: {} added, {} removed",
            self.root,
            added.len(),
            removed.len()
        );

        for handle in removed {
            let _ = self.events.send(WorkspaceEvent::ResourceRemoved(handle));
        }
        for handle in added {
            let _ = self.events.send(WorkspaceEvent::ResourceAdded(handle));
        }
        Ok(())
    }

    /// Delete a file and announce it
    pub async fn delete_file(&self, relative_path: &str) -> Result<ResourceHandle> {
        let handle = self
            .resource_for_path(relative_path)
            .ok_or_else(|| EngineError::ResourceNotFound(relative_path.to_string()))?;

        fs::remove_file(self.full_path(relative_path)).await?;
        self.resources.write().remove(relative_path);

        let _ = self
            .events
            .send(WorkspaceEvent::ResourceRemoved(handle.clone()));
        Ok(handle)
    }

    /// Rename a file within its directory and announce it
    pub async fn rename_file(&self, relative_path: &str, new_name: &str) -> Result<ResourceHandle> {
        let old = self
            .resource_for_path(relative_path)
            .ok_or_else(|| EngineError::ResourceNotFound(relative_path.to_string()))?;

        let new_path = match relative_path.rfind('/') {
            Some(index) => format!("{}/{}", &relative_path[..index], new_name),
            None => new_name.to_string(),
        };

        fs::rename(self.full_path(relative_path), self.full_path(&new_path)).await?;

        let new = self.handle_for(&new_path);
        {
            let mut resources = self.resources.write();
            resources.remove(relative_path);
            resources.insert(new_path, new.clone());
        }

        let _ = self.events.send(WorkspaceEvent::ResourceRenamed {
            old,
            new: new.clone(),
        });
        Ok(new)
    }

    async fn scan(&self) -> Result<Vec<String>> {
        let found = self.scan_paths().await?;
        let mut resources = self.resources.write();
        for path in &found {
            resources.insert(path.clone(), self.handle_for(path));
        }
        Ok(found)
    }

    async fn scan_paths(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    if let Some(relative) = self.relative_path(&entry.path()) {
                        found.push(relative);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn handle_for(&self, relative_path: &str) -> ResourceHandle {
        ResourceHandle::file_system(
            self.id.clone(),
            relative_path,
            mime_type_for_path(relative_path),
        )
    }
}

#[async_trait]
impl Project for FileSystemProject {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn space(&self) -> ResourceSpace {
        ResourceSpace::FileSystem
    }

    fn is_overrides(&self) -> bool {
        true
    }

    fn root_path(&self) -> String {
        self.root.to_string_lossy().replace('\\', "/")
    }

    fn resources(&self) -> Vec<ResourceHandle> {
        self.resources.read().values().cloned().collect()
    }

    fn resource_for_path(&self, location: &str) -> Option<ResourceHandle> {
        self.resources.read().get(location).cloned()
    }

    async fn request_content(&self, handle: &ResourceHandle) -> Result<ResourceContent> {
        let bytes = fs::read(self.full_path(&handle.location))
            .await
            .map_err(|e| EngineError::ContentRead(format!("{}: {}", handle.location, e)))?;
        Ok(ResourceContent::from_bytes(&bytes))
    }

    async fn request_bytes(&self, handle: &ResourceHandle) -> Result<Bytes> {
        let bytes = fs::read(self.full_path(&handle.location))
            .await
            .map_err(|e| EngineError::ContentRead(format!("{}: {}", handle.location, e)))?;
        Ok(Bytes::from(bytes))
    }

    async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &ResourceContent,
    ) -> Result<ResourceHandle> {
        let relative_path = if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        };
        let path = self.full_path(&relative_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::FileCreation(format!("{:?}: {}", parent, e)))?;
        }
        fs::write(&path, content.to_bytes()?)
            .await
            .map_err(|e| EngineError::FileCreation(format!("{:?}: {}", path, e)))?;

        let handle = self.handle_for(&relative_path);
        let is_new = self
            .resources
            .write()
            .insert(relative_path.clone(), handle.clone())
            .is_none();

        debug!("Created override file {}", relative_path);

        if is_new {
            let _ = self.events.send(WorkspaceEvent::ResourceAdded(handle.clone()));
        }
        Ok(handle)
    }

    async fn sync_content(
        &self,
        handle: &ResourceHandle,
        content: &ResourceContent,
    ) -> Result<()> {
        let path = self.full_path(&handle.location);
        let bytes = content.to_bytes()?;

        if let Ok(existing) = fs::read(&path).await {
            if existing == bytes {
                return Ok(());
            }
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }
}
