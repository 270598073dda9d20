// src/interception/transport.rs
//! Transport seam
//!
//! The transport captures requests on the wire; the engine only tells it
//! which URL patterns to route back. Requests matching a submitted pattern are
//! handed to `OverridesEngine::handle_intercepted_request` by the hosting
//! session.

use crate::utils::errors::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Point in the request lifecycle at which interception happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterceptionStage {
    Request,
    Response,
}

/// URL pattern (`*` wildcards, `?` one character) routed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterceptionPattern {
    pub url_pattern: String,
    pub stage: InterceptionStage,
}

impl InterceptionPattern {
    pub fn response(url_pattern: impl Into<String>) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            stage: InterceptionStage::Response,
        }
    }
}

/// Physical request capture
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replace the full set of intercepted patterns
    async fn set_interception_patterns(&self, patterns: Vec<InterceptionPattern>) -> Result<()>;
}

/// Transport that logs and records pattern updates without capturing traffic
#[derive(Debug, Default)]
pub struct LoggingTransport {
    last: Mutex<Vec<InterceptionPattern>>,
    updates: AtomicUsize,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently submitted pattern set
    pub fn last_patterns(&self) -> Vec<InterceptionPattern> {
        self.last.lock().clone()
    }

    /// Number of submissions so far
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn set_interception_patterns(&self, patterns: Vec<InterceptionPattern>) -> Result<()> {
        info!("Intercepting {} URL patterns", patterns.len());
        for pattern in &patterns {
            info!("  {:?} {}", pattern.stage, pattern.url_pattern);
        }

        *self.last.lock() = patterns;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_transport_records_updates() {
        let transport = LoggingTransport::new();
        assert_eq!(transport.update_count(), 0);

        transport
            .set_interception_patterns(vec![InterceptionPattern::response("http?://a/*")])
            .await
            .unwrap();
        transport.set_interception_patterns(Vec::new()).await.unwrap();

        assert_eq!(transport.update_count(), 2);
        assert!(transport.last_patterns().is_empty());
    }
}
