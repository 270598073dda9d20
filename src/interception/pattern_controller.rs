// src/interception/pattern_controller.rs
//! Interception pattern controller
//!
//! Derives the set of URL patterns the transport routes to the engine from the
//! files of the active overrides project, and compiles the header override
//! rule groups along the way. Recomputation is coalesced through a
//! `Throttler`; `recompute()` itself always runs immediately.

use crate::interception::transport::{InterceptionPattern, Transport};
use crate::observability::{MALFORMED_HEADER_FILES, PATTERN_UPDATES};
use crate::overrides::header_overrides::{
    extract_directory_index, parse_header_overrides, Header, HeaderOverrideResolver,
    ParsedHeaderOverrides, HEADERS_FILENAME,
};
use crate::overrides::path_encoder::{decode, LONG_URLS_DIR};
use crate::overrides::EngineEvent;
use crate::utils::errors::Result;
use crate::utils::throttler::Throttler;
use crate::workspace::{Project, ResourceHandle};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pattern covering a file of the overrides project, empty when none applies
///
/// Files directly under the root cover nothing. Collapsed long-URL files
/// cover their whole domain.
pub fn pattern_for_file_system_resource(handle: &ResourceHandle) -> String {
    let parts = handle.relative_path_parts();
    if parts.len() < 2 {
        return String::new();
    }
    if parts[1] == LONG_URLS_DIR && parts.len() != 2 {
        return format!("http?://{}/*", parts[0]);
    }
    format!("http?://{}", decode(&handle.location))
}

/// Insertion-ordered set of URL patterns
#[derive(Debug, Default)]
struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    fn add(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !pattern.is_empty() && !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    fn into_patterns(self) -> Vec<InterceptionPattern> {
        self.patterns
            .into_iter()
            .map(InterceptionPattern::response)
            .collect()
    }
}

/// Owner of the interception pattern set and header rule groups
pub struct PatternController {
    transport: Arc<dyn Transport>,
    throttler: Throttler,
    header_rules: RwLock<Arc<HeaderOverrideResolver>>,
    current: Mutex<Vec<InterceptionPattern>>,
    events: broadcast::Sender<EngineEvent>,
}

impl PatternController {
    pub fn new(
        transport: Arc<dyn Transport>,
        window: Duration,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            transport,
            throttler: Throttler::new(window),
            header_rules: RwLock::new(Arc::new(HeaderOverrideResolver::new())),
            current: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    /// Pattern set most recently submitted to the transport
    pub fn current_patterns(&self) -> Vec<InterceptionPattern> {
        self.current.lock().clone()
    }

    /// Header rule groups compiled by the last recomputation
    pub fn header_rules(&self) -> Arc<HeaderOverrideResolver> {
        Arc::clone(&*self.header_rules.read())
    }

    /// Override headers for `url`, `None` when no rule matched
    pub fn resolve_headers(
        &self,
        url: &str,
        encoded_path: &str,
        base: &[Header],
    ) -> Option<Vec<Header>> {
        self.header_rules().resolve(url, encoded_path, base)
    }

    /// Recompute the pattern set for `project` and submit it
    ///
    /// `None` (inactive, or no project) submits an empty set.
    pub async fn recompute(
        &self,
        project: Option<&Arc<dyn Project>>,
        header_overrides: bool,
    ) -> Result<Vec<InterceptionPattern>> {
        let mut rules = HeaderOverrideResolver::new();
        let mut set = PatternSet::default();

        if let Some(project) = project {
            for handle in project.resources() {
                let pattern = pattern_for_file_system_resource(&handle);

                if header_overrides && handle.name() == HEADERS_FILENAME {
                    if let Some(parsed) = self.load_header_file(project, &handle).await {
                        if !parsed.patterns.is_empty() {
                            for header_pattern in &parsed.patterns {
                                set.add(header_pattern.as_str());
                            }
                            rules.insert(parsed);
                        }
                    }
                } else {
                    set.add(pattern.as_str());
                }

                if let (head, Some(_)) = extract_directory_index(&pattern) {
                    set.add(head);
                }
            }
        }

        let patterns = set.into_patterns();
        *self.header_rules.write() = Arc::new(rules);

        self.transport
            .set_interception_patterns(patterns.clone())
            .await?;
        *self.current.lock() = patterns.clone();

        metrics::counter!(PATTERN_UPDATES).increment(1);
        info!("Interception patterns updated ({} patterns)", patterns.len());
        let _ = self.events.send(EngineEvent::PatternsUpdated(patterns.len()));

        Ok(patterns)
    }

    async fn load_header_file(
        &self,
        project: &Arc<dyn Project>,
        handle: &ResourceHandle,
    ) -> Option<ParsedHeaderOverrides> {
        let content = match project.request_content(handle).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", handle.location, e);
                return None;
            }
        };

        let text = match content.to_bytes().map(String::from_utf8) {
            Ok(Ok(text)) => text,
            _ => {
                warn!("{} is not UTF-8 text", handle.location);
                metrics::counter!(MALFORMED_HEADER_FILES).increment(1);
                return None;
            }
        };

        match parse_header_overrides(&handle.location, &text) {
            Ok(parsed) => {
                debug!(
                    "{} rules for {:?} from {}",
                    parsed.rules.len(),
                    parsed.path,
                    handle.location
                );
                Some(parsed)
            }
            Err(e) => {
                warn!("Failed to parse {} for locally overriding headers: {}", handle.location, e);
                metrics::counter!(MALFORMED_HEADER_FILES).increment(1);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::transport::{InterceptionStage, LoggingTransport};
    use crate::utils::errors::EngineError;
    use crate::workspace::{FileSystemProject, ProjectId, ResourceContent};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct DisconnectedTransport;

    #[async_trait]
    impl Transport for DisconnectedTransport {
        async fn set_interception_patterns(&self, _: Vec<InterceptionPattern>) -> Result<()> {
            Err(EngineError::Transport("target disconnected".to_string()))
        }
    }

    fn controller() -> (PatternController, Arc<LoggingTransport>) {
        let transport = Arc::new(LoggingTransport::new());
        let (events, _) = broadcast::channel(16);
        let controller =
            PatternController::new(transport.clone(), Duration::from_millis(50), events);
        (controller, transport)
    }

    async fn project_with(root: &std::path::Path, files: &[(&str, &str)]) -> Arc<dyn Project> {
        let (tx, _) = broadcast::channel(64);
        let project = FileSystemProject::open(ProjectId::new("ovr"), root, tx)
            .await
            .unwrap();
        for (path, content) in files {
            let (dir, name) = crate::overrides::path_encoder::split_directory(path);
            project
                .create_file(dir, name, &ResourceContent::text(*content))
                .await
                .unwrap();
        }
        Arc::new(project)
    }

    fn urls(patterns: &[InterceptionPattern]) -> Vec<&str> {
        patterns.iter().map(|p| p.url_pattern.as_str()).collect()
    }

    #[test]
    fn test_pattern_for_file_system_resource() {
        let id = ProjectId::new("ovr");
        let pattern = |path: &str| {
            pattern_for_file_system_resource(&ResourceHandle::file_system(id.clone(), path, ""))
        };

        assert_eq!(pattern("toplevel.txt"), "");
        assert_eq!(pattern("example.com/a%3fb.js"), "http?://example.com/a?b.js");
        assert_eq!(
            pattern("example.com/longurls/abc-0123456789abcdef.js"),
            "http?://example.com/*"
        );
        assert_eq!(pattern("example.com/longurls"), "http?://example.com/longurls");
    }

    #[tokio::test]
    async fn test_no_project_submits_empty_set() {
        let (controller, transport) = controller();
        let patterns = controller.recompute(None, true).await.unwrap();

        assert!(patterns.is_empty());
        assert_eq!(transport.update_count(), 1);
        assert!(controller.header_rules().is_empty());
    }

    #[tokio::test]
    async fn test_directory_index_adds_head() {
        let dir = tempdir().unwrap();
        let project = project_with(
            dir.path(),
            &[("example.com/index.html", "<p>"), ("example.com/app.js", "1")],
        )
        .await;

        let (controller, transport) = controller();
        controller.recompute(Some(&project), false).await.unwrap();

        let submitted = transport.last_patterns();
        assert_eq!(
            urls(&submitted),
            vec![
                "http?://example.com/app.js",
                "http?://example.com/index.html",
                "http?://example.com/",
            ]
        );
        assert!(submitted
            .iter()
            .all(|p| p.stage == InterceptionStage::Response));
    }

    #[tokio::test]
    async fn test_header_files_register_rules() {
        let dir = tempdir().unwrap();
        let project = project_with(
            dir.path(),
            &[(
                "example.com/.headers",
                r#"[{"applyTo":"*.css","headers":{"X-Css":"1"}}]"#,
            )],
        )
        .await;

        let (controller, _) = controller();
        let patterns = controller.recompute(Some(&project), true).await.unwrap();

        assert_eq!(urls(&patterns), vec!["http?://example.com/*.css"]);
        assert_eq!(controller.header_rules().rules_for("example.com/").len(), 1);

        let headers = controller
            .resolve_headers("https://example.com/site.css", "example.com/site.css", &[])
            .unwrap();
        assert_eq!(headers, vec![Header::new("X-Css", "1")]);
    }

    #[tokio::test]
    async fn test_header_files_are_plain_when_flag_off() {
        let dir = tempdir().unwrap();
        let project = project_with(
            dir.path(),
            &[(
                "example.com/.headers",
                r#"[{"applyTo":"*","headers":{"X":"1"}}]"#,
            )],
        )
        .await;

        let (controller, _) = controller();
        let patterns = controller.recompute(Some(&project), false).await.unwrap();

        assert_eq!(urls(&patterns), vec!["http?://example.com/.headers"]);
        assert!(controller.header_rules().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_header_file_contributes_nothing() {
        let dir = tempdir().unwrap();
        let project = project_with(
            dir.path(),
            &[
                ("example.com/.headers", r#"{"applyTo":"*"}"#),
                ("example.com/page.html", "<p>"),
            ],
        )
        .await;

        let (controller, _) = controller();
        let patterns = controller.recompute(Some(&project), true).await.unwrap();

        assert_eq!(urls(&patterns), vec!["http?://example.com/page.html"]);
        assert!(controller.header_rules().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_update_keeps_previous_patterns() {
        let dir = tempdir().unwrap();
        let project = project_with(dir.path(), &[("example.com/app.js", "1")]).await;

        let (events, mut rx) = broadcast::channel(16);
        let controller = PatternController::new(
            Arc::new(DisconnectedTransport),
            Duration::from_millis(50),
            events,
        );
        let err = controller.recompute(Some(&project), true).await.unwrap_err();

        assert!(matches!(err, EngineError::Transport(_)));
        assert!(controller.current_patterns().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
