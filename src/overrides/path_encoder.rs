// src/overrides/path_encoder.rs
//! URL to filesystem-legal relative path encoding
//!
//! Every network URL maps to one deterministic relative path inside the
//! overrides project:
//!
//! ```text
//! https://example.com/a/b.js?v=1#top  →  example.com/a/b.js%3fv=1
//! https://example.com/docs/           →  example.com/docs/index.html
//! https://example.com/con             →  example.com/%63%6f%6e
//! ```
//!
//! Paths that would push the project root past `max_path_length` collapse to
//! `{domain}/longurls/{name}-{hash}.{ext}`. Decoding is best effort and is not
//! invertible once that collapse has happened.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write;
use tracing::warn;

use crate::utils::config::DEFAULT_MAX_PATH_LENGTH;

/// Directory that holds collapsed long URLs
pub const LONG_URLS_DIR: &str = "longurls";

/// File name appended to directory-style URLs
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Punctuation `encodeURI` leaves untouched besides alphanumerics
const URI_UNESCAPED: &str = ";,/?:@&=+$-_.!~*'()#";

/// Characters legal in a URI but not in a file name
const FILENAME_UNSAFE: &str = "/:?*";

/// Device names Windows refuses as file names
static RESERVED_FILENAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
        "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
    ]
    .into_iter()
    .collect()
});

/// Maps URLs to relative paths inside an overrides project
#[derive(Debug, Clone, Copy)]
pub struct PathEncoder {
    max_path_length: usize,
}

impl PathEncoder {
    pub fn new(max_path_length: usize) -> Self {
        Self { max_path_length }
    }

    /// Encode `url` for a project rooted at `project_root`
    pub fn encode(&self, url: &str, project_root: &str) -> String {
        self.encode_parts(url, project_root).join("/")
    }

    /// Encoded path segments of `url`
    pub fn encode_parts(&self, url: &str, project_root: &str) -> Vec<String> {
        let mut url_path = url_without_fragment(strip_http_scheme(url)).to_string();
        if url_path.ends_with('/') && !url_path.contains('?') {
            url_path.push_str(DEFAULT_INDEX_FILE);
        }

        let parts: Vec<String> = file_name_parts(&url_path)
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| encode_segment(part))
            .collect();

        let encoded_path = parts.join("/");
        if project_root.len() + encoded_path.len() <= self.max_path_length {
            return parts;
        }

        let domain = parts.first().cloned().unwrap_or_default();
        let short_file_name = match parts.last() {
            Some(name) if !name.is_empty() => {
                format!("{}-", name.chars().take(10).collect::<String>())
            }
            _ => String::new(),
        };
        let extension = extract_extension(&url_path);
        let extension_part = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension.chars().take(10).collect::<String>())
        };

        vec![
            domain,
            LONG_URLS_DIR.to_string(),
            format!("{}{}{}", short_file_name, stable_hash(&encoded_path), extension_part),
        ]
    }
}

impl Default for PathEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH_LENGTH)
    }
}

/// Decode a local path back to a URL path (without scheme)
///
/// Returns the input unchanged when the percent-decoded bytes are not UTF-8.
pub fn decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    match String::from_utf8(decoded) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to decode local path {}: {}", path, e);
            path.to_string()
        }
    }
}

/// Extension of the last path segment, without query, fragment or escapes
pub fn extract_extension(url: &str) -> &str {
    let mut url = url_without_fragment(url);
    if let Some(index) = url.find('?') {
        url = &url[..index];
    }
    if let Some(index) = url.rfind('/') {
        url = &url[index + 1..];
    }
    match url.rfind('.') {
        Some(index) => {
            let extension = &url[index + 1..];
            match extension.find('%') {
                Some(percent) => &extension[..percent],
                None => extension,
            }
        }
        None => "",
    }
}

/// Split an encoded path into `(directory, file name)`
pub fn split_directory(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

/// `url` without its `#fragment`
pub fn url_without_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(index) => &url[..index],
        None => url,
    }
}

/// `url` without a leading `http://` or `https://`
pub fn strip_http_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// Split a URL path on `/`, keeping the query attached to the last segment
fn file_name_parts(url_path: &str) -> Vec<String> {
    match url_path.find('?') {
        None => url_path.split('/').map(str::to_string).collect(),
        Some(0) => vec![url_path.to_string()],
        Some(index) => {
            let (path, query) = url_path.split_at(index);
            let mut parts: Vec<String> = path.split('/').map(str::to_string).collect();
            if let Some(last) = parts.last_mut() {
                last.push_str(query);
            }
            parts
        }
    }
}

/// Encode one path segment into a legal file name
fn encode_segment(part: &str) -> String {
    let mut encoded = String::with_capacity(part.len());

    for ch in part.chars() {
        if FILENAME_UNSAFE.contains(ch) {
            let _ = write!(encoded, "%{:x}", ch as u32);
        } else if ch.is_ascii_alphanumeric() || URI_UNESCAPED.contains(ch) {
            encoded.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }

    if RESERVED_FILENAMES.contains(encoded.to_ascii_lowercase().as_str()) {
        encoded = encoded
            .chars()
            .map(|ch| format!("%{:x}", ch as u32))
            .collect();
    }

    if encoded.ends_with('.') {
        encoded.pop();
        encoded.push_str("%2e");
    }

    encoded
}

/// 16 lowercase hex characters derived from SHA-256 of `value`
fn stable_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(url: &str) -> String {
        PathEncoder::default().encode(url, "")
    }

    #[test]
    fn test_plain_url() {
        assert_eq!(encode("https://example.com/a/b.js"), "example.com/a/b.js");
        assert_eq!(encode("http://example.com/a/b.js#frag"), "example.com/a/b.js");
    }

    #[test]
    fn test_directory_gets_index() {
        assert_eq!(encode("http://example.com/"), "example.com/index.html");
        assert_eq!(encode("http://example.com/docs/"), "example.com/docs/index.html");
        assert_eq!(encode("http://example.com/docs/?q=1"), "example.com/docs/%3fq=1");
    }

    #[test]
    fn test_query_stays_in_last_segment() {
        assert_eq!(
            encode("https://example.com/app.js?v=1/2"),
            "example.com/app.js%3fv=1%2f2"
        );
    }

    #[test]
    fn test_unsafe_characters() {
        assert_eq!(encode("https://example.com/a b"), "example.com/a%20b");
        assert_eq!(encode("https://example.com/x:y*z"), "example.com/x%3ay%2az");
        assert_eq!(encode("https://example.com/caf\u{e9}"), "example.com/caf%C3%A9");
        assert_eq!(encode("https://example.com/100%"), "example.com/100%25");
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(encode("https://example.com/con"), "example.com/%63%6f%6e");
        assert_eq!(encode("https://example.com/LPT1"), "example.com/%4c%50%54%31");
        assert_eq!(encode("https://example.com/console"), "example.com/console");
    }

    #[test]
    fn test_trailing_dot() {
        assert_eq!(encode("https://example.com/dir./file."), "example.com/dir%2e/file%2e");
    }

    #[test]
    fn test_long_url_collapses() {
        let url = format!("http://example.com/{}", "a".repeat(250));
        let parts = PathEncoder::default().encode_parts(&url, "");

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "example.com");
        assert_eq!(parts[1], LONG_URLS_DIR);
        assert!(parts[2].starts_with("aaaaaaaaaa-"));
        assert_eq!(parts[2].len(), 11 + 16);
        assert_eq!(parts, PathEncoder::default().encode_parts(&url, ""));
    }

    #[test]
    fn test_long_url_keeps_extension() {
        let url = format!("https://example.com/{}/script.javascript?x=1", "d".repeat(220));
        let encoded = encode(&url);
        assert!(encoded.starts_with("example.com/longurls/script.jav-"));
        assert!(encoded.ends_with(".javascript"));
    }

    #[test]
    fn test_project_root_counts_toward_limit() {
        let url = format!("https://example.com/{}", "b".repeat(150));
        assert_eq!(PathEncoder::default().encode_parts(&url, "").len(), 2);
        assert_eq!(
            PathEncoder::default()
                .encode_parts(&url, &"/".repeat(60))
                .len(),
            3
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("example.com/a%20b/app.js%3fv=1"), "example.com/a b/app.js?v=1");
        assert_eq!(decode("example.com/100%"), "example.com/100%");
        assert_eq!(decode("example.com/%zz"), "example.com/%zz");
        // Invalid UTF-8 falls back to the raw input
        assert_eq!(decode("example.com/%ff"), "example.com/%ff");
    }

    #[test]
    fn test_extract_extension() {
        assert_eq!(extract_extension("example.com/a/b.min.js?x=1#y"), "js");
        assert_eq!(extract_extension("example.com/a.b/c"), "");
        assert_eq!(extract_extension("example.com/app.js%3fv=1"), "js");
    }

    #[test]
    fn test_split_directory() {
        assert_eq!(split_directory("example.com/a/b.js"), ("example.com/a", "b.js"));
        assert_eq!(split_directory("b.js"), ("", "b.js"));
    }

    proptest! {
        #[test]
        fn prop_short_urls_round_trip(
            host in "[a-z]{1,12}\\.(com|org|dev)",
            segments in prop::collection::vec("[a-zA-Z0-9 ._~:*%\u{e9}-]{1,12}", 1..4),
        ) {
            let path = format!("{}/{}", host, segments.join("/"));
            let url = format!("https://{}", path);
            let encoded = encode(&url);
            prop_assume!(encoded.split('/').nth(1) != Some(LONG_URLS_DIR));
            prop_assert_eq!(decode(&encoded), path);
        }

        #[test]
        fn prop_segments_are_legal_file_names(
            segments in prop::collection::vec("[a-zA-Z0-9 .:?*/]{1,8}", 1..5),
        ) {
            let url = format!("http://example.com/{}", segments.join("/"));
            for segment in encode(&url).split('/') {
                prop_assert!(!segment.ends_with('.'));
                prop_assert!(!RESERVED_FILENAMES.contains(segment.to_ascii_lowercase().as_str()));
                prop_assert!(!segment.contains(':') && !segment.contains('*') && !segment.contains('?'));
            }
        }

        #[test]
        fn prop_long_urls_collapse_deterministically(
            tail in "[a-z0-9]{190,250}(/[a-z0-9]{1,10}){0,3}",
        ) {
            let url = format!("http://example.com/{}", tail);
            let first = PathEncoder::default().encode_parts(&url, "");
            prop_assert_eq!(first.len(), 3);
            prop_assert_eq!(&first[1], LONG_URLS_DIR);
            prop_assert_eq!(first, PathEncoder::default().encode_parts(&url, ""));
        }
    }
}
