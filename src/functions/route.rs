//! Route derivation from source file locations.
//!
//! # Responsibilities
//! - Map a path relative to the functions root to its canonical API route
//! - Collapse `index` files onto their parent directory
//! - Produce a match pattern when the route has dynamic segments
//!
//! # Design Decisions
//! - Pure: no I/O, same input always yields the same output
//! - Routes never carry a leading or trailing slash; the root route is `""`
//! - `[name]` becomes `:name`, `[...name]` becomes `*name`

use std::path::{Component, Path};

/// File stem that collapses onto its parent directory.
pub const INDEX_NAME: &str = "index";

/// Route metadata derived from a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRoute {
    /// Canonical route, forward-slash separated, no leading slash.
    pub route: String,
    /// Parameter pattern, present only for dynamic routes.
    pub match_pattern: Option<String>,
}

/// Derive the route for a source file given relative to the functions root.
pub fn derive_route(relative: &Path) -> DerivedRoute {
    let mut segments: Vec<String> = relative
        .parent()
        .map(path_segments)
        .unwrap_or_default();

    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if stem != INDEX_NAME && !stem.is_empty() {
        segments.push(stem);
    }

    let route = segments.join("/");
    let match_pattern = match_pattern_for(&route);

    DerivedRoute {
        route,
        match_pattern,
    }
}

/// Build the parameter pattern for a route, or `None` for a literal route.
pub fn match_pattern_for(route: &str) -> Option<String> {
    if !route.contains('[') {
        return None;
    }

    let pattern = route
        .split('/')
        .map(|segment| segment.replace("[...", "*").replace('[', ":").replace(']', ""))
        .collect::<Vec<_>>()
        .join("/");

    Some(pattern)
}

fn path_segments(dir: &Path) -> Vec<String> {
    dir.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn derive(p: &str) -> DerivedRoute {
        derive_route(&PathBuf::from(p))
    }

    #[test]
    fn test_plain_file() {
        let d = derive("hello.ts");
        assert_eq!(d.route, "hello");
        assert_eq!(d.match_pattern, None);
    }

    #[test]
    fn test_nested_file() {
        assert_eq!(derive("users/profile.rs").route, "users/profile");
    }

    #[test]
    fn test_index_collapses_to_directory() {
        assert_eq!(derive("index.ts").route, "");
        assert_eq!(derive("users/index.rs").route, "users");
        assert_eq!(derive("a/b/index.js").route, "a/b");
        assert_eq!(derive("users/index.rs").match_pattern, None);
    }

    #[test]
    fn test_extension_does_not_matter() {
        assert_eq!(derive("hello.ts"), derive("hello.rs"));
    }

    #[test]
    fn test_dynamic_segment() {
        let d = derive("greet/[name].ts");
        assert_eq!(d.route, "greet/[name]");
        assert_eq!(d.match_pattern.as_deref(), Some("greet/:name"));
    }

    #[test]
    fn test_dynamic_directory_and_index() {
        let d = derive("users/[id]/index.rs");
        assert_eq!(d.route, "users/[id]");
        assert_eq!(d.match_pattern.as_deref(), Some("users/:id"));

        let d = derive("[org]/repos/[repo].rs");
        assert_eq!(d.match_pattern.as_deref(), Some(":org/repos/:repo"));
    }

    #[test]
    fn test_splat_segment() {
        let d = derive("files/[...path].rs");
        assert_eq!(d.match_pattern.as_deref(), Some("files/*path"));
    }

    #[test]
    fn test_partial_segment_parameter() {
        let d = derive("report-[year].rs");
        assert_eq!(d.match_pattern.as_deref(), Some("report-:year"));
    }
}
