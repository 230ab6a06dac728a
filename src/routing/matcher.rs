//! Parameter pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile `:name` / `*name` patterns into anchored regular expressions
//! - Match a path fragment and bind captures to parameter names
//!
//! # Design Decisions
//! - `:name` matches one segment (`[^/]+?`), `*name` matches the rest (`.+`)
//! - Case-insensitive, optional trailing slash, anchored at both ends
//! - Captures are positional; names are kept in declaration order
//! - Compiled once per registry snapshot, never on the request path

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Error compiling a parameter pattern.
#[derive(Debug, Error)]
#[error("invalid match pattern {pattern:?}: {source}")]
pub struct PatternError {
    pattern: String,
    #[source]
    source: regex::Error,
}

/// Ordered parameter bindings extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate bindings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PathParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A compiled parameter pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    keys: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern such as `users/:id` or `files/*path`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let trimmed = pattern.strip_suffix('/').unwrap_or(pattern);
        let mut body = String::with_capacity(trimmed.len() * 2);
        let mut keys = Vec::new();
        let mut chars = trimmed.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                ':' | '*' => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n.is_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }

                    if c == ':' && name.is_empty() {
                        body.push_str(&regex::escape(":"));
                        continue;
                    }
                    if name.is_empty() {
                        name = keys.len().to_string();
                    }

                    body.push_str(if c == ':' { "([^/]+?)" } else { "(.+)" });
                    keys.push(name);
                }
                other => body.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }

        let regex = Regex::new(&format!("(?i)^{}/?$", body)).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            regex,
            keys,
        })
    }

    /// Match a path fragment, returning the bound parameters.
    pub fn match_path(&self, fragment: &str) -> Option<PathParams> {
        let caps = self.regex.captures(fragment)?;
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| caps.get(i + 1).map(|m| (key.clone(), m.as_str().to_string())))
            .collect();
        Some(PathParams(params))
    }

    /// Parameter names in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
