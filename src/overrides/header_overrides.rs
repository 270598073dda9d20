// src/overrides/header_overrides.rs
//! Directory-scoped response header overrides
//!
//! A `.headers` file declares header sets for URLs under the directory it
//! lives in:
//!
//! ```json
//! [
//!   { "applyTo": "*.js", "headers": { "Cache-Control": "no-store" } },
//!   { "applyTo": "index.html", "headers": { "X-Frame-Options": "DENY" } }
//! ]
//! ```
//!
//! Rules are grouped by directory. At request time the groups are visited from
//! the most general (`""`, every domain) to the most specific directory, so
//! deeper declarations win for any header they both set.

use crate::overrides::path_encoder::decode;
use crate::utils::errors::{EngineError, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Reserved file name of header override declarations
pub const HEADERS_FILENAME: &str = ".headers";

/// Default resources served for a directory-style request
pub const DIRECTORY_INDEX_NAMES: [&str; 3] = ["index.html", "index.htm", "index.php"];

/// Response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One record of a `.headers` file
#[derive(Debug, Clone, Deserialize)]
struct HeaderOverrideDeclaration {
    #[serde(rename = "applyTo")]
    apply_to: String,
    headers: IndexMap<String, String>,
}

/// Compiled rule: URLs matching `match_pattern` receive `headers`
#[derive(Debug, Clone)]
pub struct HeaderOverrideRule {
    /// Decoded directory the rule was declared in
    pub path_prefix: String,

    /// Index file name stripped from `applyTo` for the bare-directory variant
    pub applied_directory_index_tail: Option<String>,

    pub match_pattern: Regex,

    pub headers: IndexMap<String, String>,
}

impl HeaderOverrideRule {
    pub fn matches(&self, url: &str) -> bool {
        self.match_pattern.is_match(url)
    }
}

/// Result of parsing one `.headers` file
#[derive(Debug, Clone, Default)]
pub struct ParsedHeaderOverrides {
    /// Interception patterns covering every declared URL
    pub patterns: Vec<String>,

    /// Decoded directory of the file, the rule group key
    pub path: String,

    pub rules: Vec<HeaderOverrideRule>,
}

/// Parse the `.headers` file at `relative_path`
///
/// Any invalid record rejects the whole file.
pub fn parse_header_overrides(relative_path: &str, content: &str) -> Result<ParsedHeaderOverrides> {
    let malformed = |reason: String| EngineError::MalformedOverrideFile {
        path: relative_path.to_string(),
        reason,
    };

    let declarations: Vec<HeaderOverrideDeclaration> =
        serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

    for (index, declaration) in declarations.iter().enumerate() {
        if declaration.apply_to.is_empty() {
            return Err(malformed(format!("record {} has an empty applyTo", index)));
        }
        if declaration.headers.is_empty() {
            return Err(malformed(format!("record {} declares no headers", index)));
        }
    }

    let decoded = decode(relative_path);
    let path = decoded
        .strip_suffix(HEADERS_FILENAME)
        .unwrap_or(&decoded)
        .to_string();

    let mut parsed = ParsedHeaderOverrides {
        path: path.clone(),
        ..Default::default()
    };

    for declaration in declarations {
        let target = format!("{}{}", path, declaration.apply_to);
        push_unique(&mut parsed.patterns, format!("http?://{}", target));
        parsed.rules.push(HeaderOverrideRule {
            path_prefix: path.clone(),
            applied_directory_index_tail: None,
            match_pattern: url_regex(&target)?,
            headers: declaration.headers.clone(),
        });

        let (head, tail) = extract_directory_index(&declaration.apply_to);
        if let Some(tail) = tail {
            let stripped = format!("{}{}", path, head);
            push_unique(&mut parsed.patterns, format!("http?://{}", stripped));
            parsed.rules.push(HeaderOverrideRule {
                path_prefix: path.clone(),
                applied_directory_index_tail: Some(tail.to_string()),
                match_pattern: url_regex(&stripped)?,
                headers: declaration.headers,
            });
        }
    }

    debug!(
        "Parsed {} header override rules from {}",
        parsed.rules.len(),
        relative_path
    );
    Ok(parsed)
}

/// Quote regex metacharacters, turning `*` into `.*`
pub fn escape_regex(pattern: &str) -> String {
    pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

/// Split a pattern whose last segment can name a directory index
///
/// Returns the head (up to and including the last `/`) and, when the last
/// segment matches `index.html`, `index.htm` or `index.php`, that segment.
pub fn extract_directory_index(pattern: &str) -> (&str, Option<&str>) {
    let (head, tail) = match pattern.rfind('/') {
        Some(index) => (&pattern[..index + 1], &pattern[index + 1..]),
        None => ("", pattern),
    };

    let is_index = Regex::new(&format!("^{}$", escape_regex(tail)))
        .map(|regex| DIRECTORY_INDEX_NAMES.iter().any(|name| regex.is_match(name)))
        .unwrap_or(false);

    if is_index {
        (head, Some(tail))
    } else {
        (pattern, None)
    }
}

/// Merge `overrides` into `headers`: same-named headers are replaced in
/// place, new names are appended
pub fn merge_headers(headers: &mut Vec<Header>, overrides: &IndexMap<String, String>) {
    for (name, value) in overrides {
        match headers
            .iter()
            .position(|header| header.name.eq_ignore_ascii_case(name))
        {
            Some(first) => {
                headers[first].value = value.clone();
                let mut index = headers.len();
                while index > first + 1 {
                    index -= 1;
                    if headers[index].name.eq_ignore_ascii_case(name) {
                        headers.remove(index);
                    }
                }
            }
            None => headers.push(Header::new(name.clone(), value.clone())),
        }
    }
}

/// Rule groups keyed by declaring directory
#[derive(Debug, Clone, Default)]
pub struct HeaderOverrideResolver {
    groups: HashMap<String, Vec<HeaderOverrideRule>>,
}

impl HeaderOverrideResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rules of one `.headers` file
    pub fn insert(&mut self, parsed: ParsedHeaderOverrides) {
        self.groups.insert(parsed.path, parsed.rules);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn rules_for(&self, path: &str) -> &[HeaderOverrideRule] {
        self.groups.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Response headers for `url` after applying every matching rule
    ///
    /// `encoded_path` is the URL's encoded local path. Returns `None` when no
    /// rule matched.
    pub fn resolve(&self, url: &str, encoded_path: &str, base: &[Header]) -> Option<Vec<Header>> {
        let mut headers = base.to_vec();
        let mut matched = false;

        let mut prefix = String::new();
        matched |= self.apply_group("", url, &mut headers);

        for segment in encoded_path.split('/') {
            prefix.push_str(segment);
            prefix.push('/');
            matched |= self.apply_group(&decode(&prefix), url, &mut headers);
        }

        matched.then_some(headers)
    }

    fn apply_group(&self, path: &str, url: &str, headers: &mut Vec<Header>) -> bool {
        let mut matched = false;
        for rule in self.rules_for(path) {
            if rule.matches(url) {
                merge_headers(headers, &rule.headers);
                matched = true;
            }
        }
        matched
    }
}

fn url_regex(target: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^https?://{}$", escape_regex(target)))?)
}

fn push_unique(patterns: &mut Vec<String>, pattern: String) {
    if !patterns.contains(&pattern) {
        patterns.push(pattern);
    }
}
