// src/engine.rs
//! Overrides engine service object
//!
//! Owns the encoder, binding table, pattern controller and header rules, and
//! reacts to workspace and settings events:
//!
//! ```text
//! Workspace ──WorkspaceEvent──┐
//!                             ├─→ listener task ─→ OverridesEngine ─→ BindingManager
//! Settings ───SettingsEvent───┘                          │
//!                                                        └─→ PatternController ─→ Transport
//! ```
//!
//! The engine is active when the feature is enabled, a target is connected
//! and an overrides project is set. Every activation change tears down or
//! rebuilds all bindings.

use crate::interception::pattern_controller::PatternController;
use crate::interception::transport::{InterceptionPattern, Transport};
use crate::overrides::path_encoder::{split_directory, url_without_fragment, PathEncoder};
use crate::overrides::{Binding, BindingManager, EngineEvent};
use crate::settings::{Settings, SettingsEvent};
use crate::utils::config::OverridesConfig;
use crate::utils::errors::{EngineError, Result};
use crate::workspace::{
    Project, ProjectId, ResourceHandle, ResourceKey, ResourceSpace, Workspace, WorkspaceEvent,
};
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ENGINE_CHANNEL_CAPACITY: usize = 256;

/// URLs of this scheme never take part in overrides
const SNIPPET_SCHEME: &str = "snippet://";

/// Original response body captured at interception time, resolved lazily
pub type OriginalContent = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
struct EngineState {
    project: Option<Arc<dyn Project>>,
    active: bool,
    enabled: bool,
    targets: usize,
}

pub(crate) struct EngineInner {
    pub(crate) workspace: Arc<Workspace>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) encoder: PathEncoder,
    pub(crate) bindings: BindingManager,
    pub(crate) patterns: PatternController,
    pub(crate) original_contents: DashMap<ResourceKey, OriginalContent>,
    state: RwLock<EngineState>,
    events: broadcast::Sender<EngineEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Local overrides engine
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OverridesEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl OverridesEngine {
    pub fn new(
        workspace: Arc<Workspace>,
        settings: Arc<Settings>,
        transport: Arc<dyn Transport>,
        config: &OverridesConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(ENGINE_CHANNEL_CAPACITY);

        let inner = EngineInner {
            bindings: BindingManager::new(Arc::clone(&workspace), events.clone()),
            patterns: PatternController::new(
                transport,
                Duration::from_millis(config.throttle_ms),
                events.clone(),
            ),
            encoder: PathEncoder::new(config.max_path_length),
            original_contents: DashMap::new(),
            state: RwLock::new(EngineState::default()),
            workspace,
            settings,
            events,
            listener: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start following workspace and settings events
    ///
    /// Picks up the current toggle and any overrides project already in the
    /// workspace.
    pub async fn attach(&self) {
        let mut workspace_events = self.inner.workspace.subscribe();
        let mut settings_events = self.inner.settings.subscribe();

        self.enabled_changed().await;
        for project in self
            .inner
            .workspace
            .projects_for_space(ResourceSpace::FileSystem)
        {
            self.project_added(project).await;
        }

        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = workspace_events.recv() => match event {
                        Ok(event) => {
                            let Some(inner) = weak.upgrade() else { break };
                            OverridesEngine { inner }.on_workspace_event(event).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Overrides engine missed {} workspace events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    event = settings_events.recv() => match event {
                        Ok(event) => {
                            let Some(inner) = weak.upgrade() else { break };
                            OverridesEngine { inner }.on_settings_event(event).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Overrides engine missed {} settings events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Overrides engine listener stopped");
        });

        if let Some(previous) = self.inner.listener.lock().replace(listener) {
            previous.abort();
        }
        info!("Overrides engine attached");
    }

    /// Stop following events
    pub fn detach(&self) {
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.abort();
            info!("Overrides engine detached");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.read().active
    }

    /// Current overrides project, active or not
    pub fn project(&self) -> Option<Arc<dyn Project>> {
        self.inner.state.read().project.clone()
    }

    pub(crate) fn active_project(&self) -> Option<Arc<dyn Project>> {
        let state = self.inner.state.read();
        if state.active {
            state.project.clone()
        } else {
            None
        }
    }

    fn is_active_project(&self, project_id: &ProjectId) -> bool {
        self.inner
            .state
            .read()
            .project
            .as_ref()
            .map(|project| project.id() == project_id)
            .unwrap_or(false)
    }

    /// Encoded local path of `url`, empty while inactive
    pub fn encoded_path_from_url(&self, url: &str) -> String {
        match self.active_project() {
            Some(project) => self.inner.encoder.encode(url, &project.root_path()),
            None => String::new(),
        }
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.inner.bindings.bindings()
    }

    pub fn binding_for(&self, handle: &ResourceHandle) -> Option<Binding> {
        self.inner.bindings.binding_for(handle)
    }

    /// Pattern set most recently submitted to the transport
    pub fn current_patterns(&self) -> Vec<InterceptionPattern> {
        self.inner.patterns.current_patterns()
    }

    /// Original response body of a bound resource, from either side
    pub fn original_content_for(&self, handle: &ResourceHandle) -> Option<OriginalContent> {
        let binding = self.inner.bindings.binding_for(handle)?;
        self.inner
            .original_contents
            .get(&binding.file_system.key())
            .map(|content| content.value().clone())
    }

    /// React to the overrides toggle
    pub async fn enabled_changed(&self) {
        let enabled = self.inner.settings.overrides_enabled();
        {
            let mut state = self.inner.state.write();
            if state.enabled == enabled {
                return;
            }
            state.enabled = enabled;
        }
        info!("Overrides {}", if enabled { "enabled" } else { "disabled" });
        self.update_active_project().await;
    }

    pub async fn target_added(&self) {
        self.inner.state.write().targets += 1;
        self.update_active_project().await;
    }

    pub async fn target_removed(&self) {
        {
            let mut state = self.inner.state.write();
            state.targets = state.targets.saturating_sub(1);
        }
        self.update_active_project().await;
    }

    /// Recompute the active flag and rebuild or tear down bindings
    pub async fn update_active_project(&self) {
        let (was_active, active, project) = {
            let mut state = self.inner.state.write();
            let was_active = state.active;
            state.active = state.enabled && state.targets > 0 && state.project.is_some();
            (was_active, state.active, state.project.clone())
        };

        if active != was_active {
            info!("Overrides {}", if active { "active" } else { "inactive" });

            if active {
                if let Some(project) = &project {
                    for handle in project.resources() {
                        self.file_system_resource_added(&handle).await;
                    }
                }
                for network in self
                    .inner
                    .workspace
                    .projects_for_space(ResourceSpace::Network)
                {
                    for handle in network.resources() {
                        self.network_resource_added(&handle).await;
                    }
                }
            } else {
                if let Some(project) = &project {
                    for handle in project.resources() {
                        self.file_system_resource_removed(&handle).await;
                    }
                }
                self.inner.bindings.clear_network_index();
            }
        }

        self.schedule_update();
    }

    /// Make `project` the overrides project, or clear it
    pub async fn set_project(&self, project: Option<Arc<dyn Project>>) {
        let previous = self.project();
        let unchanged = match (&previous, &project) {
            (Some(previous), Some(project)) => previous.id() == project.id(),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        if let Some(previous) = &previous {
            for handle in previous.resources() {
                self.file_system_resource_removed(&handle).await;
            }
        }

        self.inner.state.write().project = project.clone();

        if let Some(project) = &project {
            for handle in project.resources() {
                self.file_system_resource_added(&handle).await;
            }
        }

        self.update_active_project().await;

        let project_id = project.map(|project| project.id().clone());
        info!("Overrides project changed: {:?}", project_id);
        let _ = self.inner.events.send(EngineEvent::ProjectChanged(project_id));
    }

    /// Adopt an `overrides` file system project, replacing the current one
    pub async fn project_added(&self, project: Arc<dyn Project>) {
        if project.space() != ResourceSpace::FileSystem || !project.is_overrides() {
            return;
        }
        if project.root_path().is_empty() {
            return;
        }

        let previous = self.project();
        if let Some(previous) = &previous {
            if previous.id() == project.id() {
                return;
            }
        }
        // Adopt first so the removal event below no longer names the active project.
        self.set_project(Some(project)).await;
        if let Some(previous) = previous {
            self.inner.workspace.remove_project(previous.id());
        }
    }

    pub async fn project_removed(&self, project_id: &ProjectId) {
        if self.is_active_project(project_id) {
            self.set_project(None).await;
        }
    }

    pub async fn resource_added(&self, handle: &ResourceHandle) {
        match handle.space {
            ResourceSpace::Network => self.network_resource_added(handle).await,
            ResourceSpace::FileSystem => self.file_system_resource_added(handle).await,
        }
    }

    pub async fn resource_removed(&self, handle: &ResourceHandle) {
        match handle.space {
            ResourceSpace::Network => self.network_resource_removed(handle),
            ResourceSpace::FileSystem => self.file_system_resource_removed(handle).await,
        }
    }

    pub async fn resource_renamed(&self, old: &ResourceHandle, new: &ResourceHandle) {
        self.resource_removed(old).await;
        self.resource_added(new).await;
    }

    /// Edits committed on a network resource are saved as overrides
    pub async fn working_copy_committed(&self, handle: &ResourceHandle) {
        if let Err(e) = self.save_for_override(handle).await {
            error!("Failed to save {} for overrides: {}", handle.location, e);
        }
    }

    fn can_handle_network_resource(&self, handle: &ResourceHandle) -> bool {
        self.is_active() && !handle.url().starts_with(SNIPPET_SCHEME)
    }

    async fn network_resource_added(&self, handle: &ResourceHandle) {
        if !handle.is_network() || !self.can_handle_network_resource(handle) {
            return;
        }
        let Some(project) = self.active_project() else {
            return;
        };

        let encoded_path = self.encoded_path_from_url(url_without_fragment(handle.url()));
        self.inner
            .bindings
            .index_network(encoded_path.clone(), handle.clone());

        if let Some(file) = project.resource_for_path(&encoded_path) {
            self.inner.bindings.bind(handle.clone(), file).await;
        }
    }

    async fn file_system_resource_added(&self, handle: &ResourceHandle) {
        if !self.is_active() || !self.is_active_project(&handle.project_id) {
            return;
        }
        self.schedule_update();

        if let Some(network) = self.inner.bindings.network_for_encoded_path(&handle.location) {
            self.inner.bindings.bind(network, handle.clone()).await;
        }
    }

    fn network_resource_removed(&self, handle: &ResourceHandle) {
        self.inner.bindings.unbind(handle);
        let encoded_path = self.encoded_path_from_url(url_without_fragment(handle.url()));
        self.inner.bindings.unindex_network(&encoded_path, handle);
    }

    async fn file_system_resource_removed(&self, handle: &ResourceHandle) {
        if !self.is_active_project(&handle.project_id) {
            return;
        }
        self.schedule_update();
        self.inner.original_contents.remove(&handle.key());
        self.inner.bindings.unbind(handle);
    }

    pub fn can_save_for_override(&self, handle: &ResourceHandle) -> bool {
        self.is_active()
            && handle.is_network()
            && !self.inner.bindings.is_bound(handle)
            && !self.inner.bindings.is_saving(handle)
    }

    /// Write the content of a network resource into the overrides project and
    /// bind the new file to it
    ///
    /// Returns `None` without doing anything when the resource cannot be
    /// saved right now.
    pub async fn save_for_override(&self, handle: &ResourceHandle) -> Result<Option<ResourceHandle>> {
        if !self.can_save_for_override(handle) || !self.inner.bindings.try_begin_save(handle) {
            return Ok(None);
        }

        let result = self.write_override_file(handle).await;
        self.inner.bindings.end_save(handle);
        result.map(Some)
    }

    async fn write_override_file(&self, handle: &ResourceHandle) -> Result<ResourceHandle> {
        let project = self
            .active_project()
            .ok_or_else(|| EngineError::ProjectNotFound("no active overrides project".into()))?;
        let network = self
            .inner
            .workspace
            .project_for(handle)
            .ok_or_else(|| EngineError::ProjectNotFound(handle.project_id.to_string()))?;

        let encoded_path = self.encoded_path_from_url(url_without_fragment(handle.url()));
        let (dir, name) = split_directory(&encoded_path);
        let content = network.request_content(handle).await?;

        let file = project.create_file(dir, name, &content).await?;
        info!("Saved {} for overrides as {}", handle.location, file.location);
        let _ = self.inner.events.send(EngineEvent::FileCreated {
            dir: dir.to_string(),
            name: name.to_string(),
        });

        self.schedule_update();
        self.inner.bindings.bind(handle.clone(), file.clone()).await;
        Ok(file)
    }

    /// Recompute the interception patterns after the throttle window
    pub fn schedule_update(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.patterns.throttler().schedule(move || async move {
            let Some(inner) = weak.upgrade() else { return };
            if let Err(e) = (OverridesEngine { inner }).force_update().await {
                warn!("Failed to update interception patterns: {}", e);
            }
        });
    }

    /// Recompute the interception patterns now
    pub async fn force_update(&self) -> Result<Vec<InterceptionPattern>> {
        let project = self.active_project();
        self.inner
            .patterns
            .recompute(project.as_ref(), self.inner.settings.header_overrides())
            .await
    }

    async fn on_workspace_event(&self, event: WorkspaceEvent) {
        match event {
            WorkspaceEvent::ProjectAdded(id) => {
                if let Some(project) = self.inner.workspace.project(&id) {
                    self.project_added(project).await;
                }
            }
            WorkspaceEvent::ProjectRemoved(id) => self.project_removed(&id).await,
            WorkspaceEvent::ResourceAdded(handle) => self.resource_added(&handle).await,
            WorkspaceEvent::ResourceRemoved(handle) => self.resource_removed(&handle).await,
            WorkspaceEvent::ResourceRenamed { old, new } => {
                self.resource_renamed(&old, &new).await
            }
            WorkspaceEvent::WorkingCopyCommitted(handle) => {
                self.working_copy_committed(&handle).await
            }
        }
    }

    async fn on_settings_event(&self, event: SettingsEvent) {
        match event {
            SettingsEvent::OverridesEnabledChanged(_) => self.enabled_changed().await,
            SettingsEvent::HeaderOverridesChanged(_) => self.schedule_update(),
        }
    }
}

impl std::fmt::Debug for OverridesEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("OverridesEngine")
            .field("active", &state.active)
            .field("enabled", &state.enabled)
            .field("targets", &state.targets)
            .field(
                "project",
                &state.project.as_ref().map(|project| project.id().clone()),
            )
            .finish()
    }
}
