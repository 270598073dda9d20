// src/overrides/bindings.rs
//! Network ↔ file system binding table
//!
//! A binding marks a local file as the override for a network resource. Each
//! handle takes part in at most one binding. All reads and writes of the
//! table go through `BindingManager`; the lock is never held across an await,
//! so a bind or unbind is atomic with respect to the table even though the
//! content sync that follows a bind runs afterwards.

use crate::observability::ACTIVE_BINDINGS;
use crate::overrides::EngineEvent;
use crate::utils::errors::{EngineError, Result};
use crate::workspace::{ResourceHandle, ResourceKey, Workspace};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A local file overriding a network resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub network: ResourceHandle,
    pub file_system: ResourceHandle,
}

impl Binding {
    fn is_pair(&self, network: &ResourceHandle, file_system: &ResourceHandle) -> bool {
        self.network.key() == network.key() && self.file_system.key() == file_system.key()
    }
}

#[derive(Default)]
struct BindingTable {
    /// Both sides of every binding map to it
    bindings: HashMap<ResourceKey, Binding>,

    /// Network resources seen so far, by encoded path
    network_for_encoded_path: HashMap<String, ResourceHandle>,

    /// Network handles with a save-for-override in flight
    saving: HashSet<ResourceKey>,
}

impl BindingTable {
    fn remove(&mut self, key: &ResourceKey) -> Option<Binding> {
        let binding = self.bindings.remove(key)?;
        self.bindings.remove(&binding.network.key());
        self.bindings.remove(&binding.file_system.key());
        Some(binding)
    }

    fn binding_count(&self) -> usize {
        self.bindings.len() / 2
    }
}

/// Owner of the binding table
pub struct BindingManager {
    table: Mutex<BindingTable>,
    workspace: Arc<Workspace>,
    events: broadcast::Sender<EngineEvent>,
}

impl BindingManager {
    pub fn new(workspace: Arc<Workspace>, events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            table: Mutex::new(BindingTable::default()),
            workspace,
            events,
        }
    }

    /// Binding `handle` takes part in, from either side
    pub fn binding_for(&self, handle: &ResourceHandle) -> Option<Binding> {
        self.table.lock().bindings.get(&handle.key()).cloned()
    }

    pub fn is_bound(&self, handle: &ResourceHandle) -> bool {
        self.table.lock().bindings.contains_key(&handle.key())
    }

    /// Every binding, once
    pub fn bindings(&self) -> Vec<Binding> {
        let table = self.table.lock();
        table
            .bindings
            .iter()
            .filter(|(key, binding)| **key == binding.network.key())
            .map(|(_, binding)| binding.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.lock().binding_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind `network` to `file_system` and sync their content
    ///
    /// Rebinding an identical pair is a no-op. Otherwise any binding either
    /// side already has is removed first.
    pub async fn bind(&self, network: ResourceHandle, file_system: ResourceHandle) {
        let (removed, truth, target) = {
            let mut table = self.table.lock();

            if let Some(existing) = table.bindings.get(&network.key()) {
                if existing.is_pair(&network, &file_system) {
                    debug!("Already bound: {} ↔ {}", network.location, file_system.location);
                    return;
                }
            }

            let mut removed = Vec::new();
            removed.extend(table.remove(&network.key()));
            removed.extend(table.remove(&file_system.key()));

            let binding = Binding {
                network: network.clone(),
                file_system: file_system.clone(),
            };
            table.bindings.insert(network.key(), binding.clone());
            table.bindings.insert(file_system.key(), binding);
            metrics::gauge!(ACTIVE_BINDINGS).set(table.binding_count() as f64);

            if table.saving.contains(&network.key()) {
                (removed, network.clone(), file_system.clone())
            } else {
                (removed, file_system.clone(), network.clone())
            }
        };

        for binding in removed {
            let _ = self.events.send(EngineEvent::BindingRemoved(binding));
        }

        info!("Bound {} ↔ {}", network.location, file_system.location);
        let _ = self.events.send(EngineEvent::BindingCreated(Binding {
            network,
            file_system,
        }));

        if let Err(e) = self.sync_content(&truth, &target).await {
            warn!(
                "Failed to sync {} from {}: {}",
                target.location, truth.location, e
            );
        }
    }

    /// Remove the binding `handle` takes part in, if any
    pub fn unbind(&self, handle: &ResourceHandle) -> Option<Binding> {
        let removed = {
            let mut table = self.table.lock();
            let removed = table.remove(&handle.key());
            metrics::gauge!(ACTIVE_BINDINGS).set(table.binding_count() as f64);
            removed
        }?;

        debug!(
            "Unbound {} ↔ {}",
            removed.network.location, removed.file_system.location
        );
        let _ = self.events.send(EngineEvent::BindingRemoved(removed.clone()));
        Some(removed)
    }

    /// Remember a network resource under its encoded path
    pub fn index_network(&self, encoded_path: String, handle: ResourceHandle) {
        self.table
            .lock()
            .network_for_encoded_path
            .insert(encoded_path, handle);
    }

    /// Forget the network resource at `encoded_path` if it is `handle`
    pub fn unindex_network(&self, encoded_path: &str, handle: &ResourceHandle) {
        let mut table = self.table.lock();
        let matches = table
            .network_for_encoded_path
            .get(encoded_path)
            .map(|indexed| indexed.key() == handle.key())
            .unwrap_or(false);
        if matches {
            table.network_for_encoded_path.remove(encoded_path);
        }
    }

    pub fn network_for_encoded_path(&self, encoded_path: &str) -> Option<ResourceHandle> {
        self.table
            .lock()
            .network_for_encoded_path
            .get(encoded_path)
            .cloned()
    }

    pub fn clear_network_index(&self) {
        self.table.lock().network_for_encoded_path.clear();
    }

    /// Mark `handle` as saving unless it is bound or already saving
    pub fn try_begin_save(&self, handle: &ResourceHandle) -> bool {
        let mut table = self.table.lock();
        let key = handle.key();
        if table.bindings.contains_key(&key) || table.saving.contains(&key) {
            return false;
        }
        table.saving.insert(key)
    }

    pub fn end_save(&self, handle: &ResourceHandle) {
        self.table.lock().saving.remove(&handle.key());
    }

    pub fn is_saving(&self, handle: &ResourceHandle) -> bool {
        self.table.lock().saving.contains(&handle.key())
    }

    /// Copy the content of `truth` into `target`
    async fn sync_content(&self, truth: &ResourceHandle, target: &ResourceHandle) -> Result<()> {
        let source = self
            .workspace
            .project_for(truth)
            .ok_or_else(|| EngineError::ProjectNotFound(truth.project_id.to_string()))?;
        let destination = self
            .workspace
            .project_for(target)
            .ok_or_else(|| EngineError::ProjectNotFound(target.project_id.to_string()))?;

        let content = source.request_content(truth).await?;
        destination.sync_content(target, &content).await?;

        debug!("Synced {} → {}", truth.location, target.location);
        Ok(())
    }
}
