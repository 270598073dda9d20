// src/interception/handler.rs
//! Per-request interception decision
//!
//! Runs for every request the transport routes back to the engine:
//!
//! ```text
//! GET/POST while active
//!     │
//!     ├─ encoded path ──→ overrides file?     ──┐
//!     └─ .headers rules ──→ override headers? ──┤
//!                                               ├─ neither → pass through
//!                                               ├─ file    → serve file bytes
//!                                               └─ headers → original body, new headers
//! ```

use crate::engine::OverridesEngine;
use crate::interception::resource_type::ResourceType;
use crate::observability::{REQUESTS_INTERCEPTED, REQUESTS_PASSED_THROUGH};
use crate::overrides::Header;
use crate::utils::errors::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use futures::future::{self, FutureExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Response body as delivered by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody {
    /// Body text, base64 when `encoded`; `None` when unavailable
    pub content: Option<String>,
    pub encoded: bool,
}

impl ResponseBody {
    /// Body as UTF-8 text, decoding base64 first when needed
    pub fn decoded_text(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        if !self.encoded {
            return Some(content.clone());
        }
        match STANDARD.decode(content.as_bytes()) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!("Failed to decode response body: {}", e);
                None
            }
        }
    }
}

/// Substitute response handed back to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedContent {
    pub body: Bytes,
    pub mime_type: String,

    /// `body` holds base64 text rather than raw bytes
    pub encoded: bool,

    pub headers: Vec<Header>,
}

/// Request paused at the response stage
#[async_trait]
pub trait InterceptedRequest: Send + Sync {
    fn method(&self) -> &str;

    fn url(&self) -> &str;

    /// Headers of the live response, when one was received
    fn response_headers(&self) -> Option<&[Header]>;

    /// Category the page expected
    fn resource_type(&self) -> ResourceType;

    /// Body of the live response
    async fn response_body(&self) -> Result<ResponseBody>;

    /// Fulfil the request with `content` instead of the live response
    async fn continue_with_content(&self, content: InterceptedContent) -> Result<()>;
}

/// What the engine did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptionDecision {
    PassThrough,
    ServedFromFile,
    HeadersOverridden,
}

/// MIME type of a substituted response
///
/// The live `Content-Type` wins. Otherwise the local file's MIME type is used
/// when it classifies as the expected category, else the category's
/// canonical type.
pub fn resolve_mime_type(
    response_headers: Option<&[Header]>,
    file_mime_type: Option<&str>,
    expected: ResourceType,
) -> String {
    let content_type = response_headers
        .unwrap_or_default()
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case("content-type"))
        .map(|header| header.value.as_str())
        .unwrap_or_default();
    if !content_type.is_empty() {
        return content_type.to_string();
    }

    let mime_type = file_mime_type.unwrap_or_default();
    if ResourceType::from_mime_type(mime_type) == expected {
        mime_type.to_string()
    } else {
        expected.canonical_mime_type().to_string()
    }
}

impl OverridesEngine {
    /// Decide how to answer an intercepted request and answer it
    pub async fn handle_intercepted_request(
        &self,
        request: Arc<dyn InterceptedRequest>,
    ) -> InterceptionDecision {
        let decision = self.intercept(request).await;
        match decision {
            InterceptionDecision::PassThrough => {
                metrics::counter!(REQUESTS_PASSED_THROUGH).increment(1)
            }
            _ => metrics::counter!(REQUESTS_INTERCEPTED).increment(1),
        }
        decision
    }

    async fn intercept(&self, request: Arc<dyn InterceptedRequest>) -> InterceptionDecision {
        let method = request.method();
        if method != "GET" && method != "POST" {
            return InterceptionDecision::PassThrough;
        }
        let Some(project) = self.active_project() else {
            return InterceptionDecision::PassThrough;
        };

        let url = request.url().to_string();
        let encoded_path = self.encoded_path_from_url(&url);
        let file = project.resource_for_path(&encoded_path);

        let base_headers = request.response_headers().unwrap_or_default();
        let overridden = if self.inner.settings.header_overrides() {
            self.inner
                .patterns
                .resolve_headers(&url, &encoded_path, base_headers)
        } else {
            None
        };

        if file.is_none() && overridden.is_none() {
            return InterceptionDecision::PassThrough;
        }
        let headers = overridden.unwrap_or_else(|| base_headers.to_vec());

        let mime_type = resolve_mime_type(
            request.response_headers(),
            file.as_ref().map(|file| file.mime_type.as_str()),
            request.resource_type(),
        );

        match file {
            Some(file) => {
                // The server body is only readable while the request is paused.
                let (original, body) =
                    tokio::join!(request.response_body(), project.request_bytes(&file));
                let original = match original {
                    Ok(original) => original.decoded_text(),
                    Err(e) => {
                        debug!("Original response unavailable: {}", e);
                        None
                    }
                };
                self.inner
                    .original_contents
                    .insert(file.key(), future::ready(original).boxed().shared());

                let body = match body {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Failed to read override {}: {}", file.location, e);
                        return InterceptionDecision::PassThrough;
                    }
                };

                debug!("Serving {} from {}", url, file.location);
                let content = InterceptedContent {
                    body,
                    mime_type,
                    encoded: false,
                    headers,
                };
                match request.continue_with_content(content).await {
                    Ok(()) => InterceptionDecision::ServedFromFile,
                    Err(e) => {
                        warn!("Failed to fulfil {}: {}", url, e);
                        InterceptionDecision::PassThrough
                    }
                }
            }
            None => {
                let body = match request.response_body().await {
                    Ok(ResponseBody {
                        content: Some(content),
                        encoded,
                    }) => (content, encoded),
                    Ok(_) => return InterceptionDecision::PassThrough,
                    Err(e) => {
                        warn!("Failed to read response body of {}: {}", url, e);
                        return InterceptionDecision::PassThrough;
                    }
                };

                debug!("Overriding headers of {}", url);
                let content = InterceptedContent {
                    body: Bytes::from(body.0),
                    mime_type,
                    encoded: body.1,
                    headers,
                };
                match request.continue_with_content(content).await {
                    Ok(()) => InterceptionDecision::HeadersOverridden,
                    Err(e) => {
                        warn!("Failed to fulfil {}: {}", url, e);
                        InterceptionDecision::PassThrough
                    }
                }
            }
        }
    }
}
