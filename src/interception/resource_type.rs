// src/interception/resource_type.rs
//! Request resource categories and MIME classification
//!
//! The transport tags every intercepted request with the category the page
//! expected (document, script, stylesheet, ...). When a substituted response
//! has no usable `Content-Type`, the category decides the MIME type.

use crate::overrides::path_encoder::extract_extension;
use serde::{Deserialize, Serialize};

/// Resource category of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Script,
    Image,
    Media,
    Font,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    Manifest,
    Wasm,
    Other,
}

impl ResourceType {
    /// Parse a protocol resource type name, unknown names map to `Other`
    pub fn from_protocol_name(name: &str) -> Self {
        match name {
            "Document" => Self::Document,
            "Stylesheet" => Self::Stylesheet,
            "Script" => Self::Script,
            "Image" => Self::Image,
            "Media" => Self::Media,
            "Font" => Self::Font,
            "XHR" => Self::Xhr,
            "Fetch" => Self::Fetch,
            "Manifest" => Self::Manifest,
            "Wasm" => Self::Wasm,
            _ => Self::Other,
        }
    }

    /// Classify a MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        let mime_type = mime_type.trim().to_ascii_lowercase();

        if mime_type.is_empty() {
            return Self::Other;
        }
        if mime_type.starts_with("text/html") {
            return Self::Document;
        }
        if mime_type.starts_with("text/css") {
            return Self::Stylesheet;
        }
        if mime_type.starts_with("image/") {
            return Self::Image;
        }
        if mime_type.starts_with("audio/") || mime_type.starts_with("video/") {
            return Self::Media;
        }
        if mime_type.starts_with("text/") {
            return Self::Script;
        }
        if mime_type.contains("font") {
            return Self::Font;
        }
        if mime_type.contains("script") {
            return Self::Script;
        }
        if mime_type.starts_with("application/wasm") {
            return Self::Wasm;
        }
        if mime_type.starts_with("application/manifest+json") {
            return Self::Manifest;
        }
        if mime_type.contains("octet") {
            return Self::Other;
        }
        if mime_type.contains("application") {
            return Self::Script;
        }
        Self::Other
    }

    /// MIME type served for this category when nothing better is known
    ///
    /// Empty for categories without a single canonical type.
    pub fn canonical_mime_type(&self) -> &'static str {
        match self {
            Self::Document => "text/html",
            Self::Stylesheet => "text/css",
            Self::Script => "text/javascript",
            Self::Manifest => "application/manifest+json",
            Self::Wasm => "application/wasm",
            _ => "",
        }
    }
}

/// MIME type for a local file, inferred from its extension
pub fn mime_type_for_path(path: &str) -> &'static str {
    match extract_extension(path).to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" | "cjs" => "text/javascript",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "wasm" => "application/wasm",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ResourceType::from_mime_type("text/html; charset=utf-8"), ResourceType::Document);
        assert_eq!(ResourceType::from_mime_type("text/css"), ResourceType::Stylesheet);
        assert_eq!(ResourceType::from_mime_type("application/javascript"), ResourceType::Script);
        assert_eq!(ResourceType::from_mime_type("image/png"), ResourceType::Image);
        assert_eq!(ResourceType::from_mime_type("font/woff2"), ResourceType::Font);
        assert_eq!(ResourceType::from_mime_type("application/octet-stream"), ResourceType::Other);
        assert_eq!(ResourceType::from_mime_type(""), ResourceType::Other);
    }

    #[test]
    fn test_canonical_types_classify_back() {
        for resource_type in [
            ResourceType::Document,
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Manifest,
            ResourceType::Wasm,
        ] {
            let mime = resource_type.canonical_mime_type();
            assert_eq!(ResourceType::from_mime_type(mime), resource_type, "{}", mime);
        }
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(ResourceType::from_protocol_name("XHR"), ResourceType::Xhr);
        assert_eq!(ResourceType::from_protocol_name("Ping"), ResourceType::Other);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_type_for_path("example.com/index.html"), "text/html");
        assert_eq!(mime_type_for_path("example.com/app.js%3fv=2"), "text/javascript");
        assert_eq!(mime_type_for_path("example.com/.headers"), "text/plain");
        assert_eq!(mime_type_for_path("example.com/LOGO.PNG"), "image/png");
    }
}
