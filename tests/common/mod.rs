// tests/common/mod.rs
//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use overrides_engine::interception::{
    InterceptedContent, InterceptedRequest, LoggingTransport, ResourceType, ResponseBody,
};
use overrides_engine::overrides::Header;
use overrides_engine::utils::config::OverridesConfig;
use overrides_engine::utils::errors::{EngineError, Result};
use overrides_engine::workspace::{
    FileSystemProject, NetworkProject, Project, ProjectId, ResourceContent, Workspace,
};
use overrides_engine::{OverridesEngine, Settings};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Request paused at the response stage, recording how it was fulfilled
///
/// Like a real paused request, its body can no longer be read once it has
/// been continued.
pub struct FakeRequest {
    pub method: String,
    pub url: String,
    pub headers: Option<Vec<Header>>,
    pub resource_type: ResourceType,
    pub body: ResponseBody,
    pub fulfilled: Mutex<Option<InterceptedContent>>,
}

impl FakeRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: None,
            resource_type: ResourceType::Document,
            body: ResponseBody {
                content: Some("remote".to_string()),
                encoded: false,
            },
            fulfilled: Mutex::new(None),
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn with_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.headers = Some(
            headers
                .iter()
                .map(|(name, value)| Header::new(*name, *value))
                .collect(),
        );
        self
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn fulfilled(&self) -> Option<InterceptedContent> {
        self.fulfilled.lock().clone()
    }
}

#[async_trait]
impl InterceptedRequest for FakeRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn response_headers(&self) -> Option<&[Header]> {
        self.headers.as_deref()
    }

    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    async fn response_body(&self) -> Result<ResponseBody> {
        if self.fulfilled.lock().is_some() {
            return Err(EngineError::Transport(format!(
                "{} is no longer paused",
                self.url
            )));
        }
        Ok(self.body.clone())
    }

    async fn continue_with_content(&self, content: InterceptedContent) -> Result<()> {
        *self.fulfilled.lock() = Some(content);
        Ok(())
    }
}

/// Engine wired to a temp overrides directory and an in-memory network project
pub struct Harness {
    pub dir: TempDir,
    pub workspace: Arc<Workspace>,
    pub settings: Arc<Settings>,
    pub transport: Arc<LoggingTransport>,
    pub network: Arc<NetworkProject>,
    pub overrides: Arc<FileSystemProject>,
    pub engine: OverridesEngine,
}

impl Harness {
    /// Enabled, attached, with one connected target
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Arc::new(Workspace::new());
        let settings = Arc::new(Settings::new(true, true));
        let transport = Arc::new(LoggingTransport::new());

        let network = Arc::new(NetworkProject::new(
            ProjectId::new("network"),
            workspace.event_sender(),
        ));
        workspace.add_project(network.clone());

        let overrides = Arc::new(
            FileSystemProject::open(
                ProjectId::new("overrides"),
                dir.path(),
                workspace.event_sender(),
            )
            .await
            .unwrap(),
        );
        workspace.add_project(overrides.clone());

        let config = OverridesConfig {
            throttle_ms: 10,
            ..Default::default()
        };
        let engine = OverridesEngine::new(
            workspace.clone(),
            settings.clone(),
            transport.clone(),
            &config,
        );
        engine.attach().await;
        engine.target_added().await;

        Self {
            dir,
            workspace,
            settings,
            transport,
            network,
            overrides,
            engine,
        }
    }

    /// Write a file into the overrides directory through the project
    pub async fn write_override(&self, dir: &str, name: &str, content: &str) {
        self.overrides
            .create_file(dir, name, &ResourceContent::text(content))
            .await
            .unwrap();
    }

    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.transport
            .last_patterns()
            .iter()
            .any(|p| p.url_pattern == pattern)
    }

    pub fn read_override(&self, relative_path: &str) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join(relative_path)).ok()
    }
}

/// Poll `condition` until it holds, failing after a few seconds
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
