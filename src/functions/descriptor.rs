//! Function descriptors.

use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::functions::route::derive_route;

/// One discovered function: a route bound to its source and compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Canonical route (no leading slash; `""` is the root route).
    pub route: String,

    /// Source file relative to the functions root, forward-slash separated.
    pub source_path: String,

    /// Compiled artifact relative to the output directory.
    pub relative_artifact_path: String,

    /// Absolute compiled artifact path. Not portable across machines.
    pub artifact_path: PathBuf,

    /// Parameter pattern, only for dynamic routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
}

impl FunctionDescriptor {
    /// Build a descriptor for `relative` (relative to the functions root),
    /// placing its artifact under `output_dir`.
    pub fn from_source(relative: &Path, output_dir: &Path) -> Self {
        let derived = derive_route(relative);
        let entry = entry_name(relative);
        let relative_artifact_path = format!("{}{}", entry, std::env::consts::EXE_SUFFIX);

        let artifact_path = relative_artifact_path
            .split('/')
            .fold(output_dir.to_path_buf(), |acc, part| acc.join(part));

        Self {
            route: derived.route,
            source_path: forward_slashes(relative),
            relative_artifact_path,
            artifact_path,
            match_pattern: derived.match_pattern,
        }
    }

    /// Compile entry name: the source path without its extension.
    pub fn entry_name(&self) -> String {
        entry_name(Path::new(&self.source_path))
    }

    /// Whether this function only matches literally.
    pub fn is_literal(&self) -> bool {
        self.match_pattern.is_none()
    }
}

/// Source path without extension, forward-slash separated.
pub fn entry_name(relative: &Path) -> String {
    forward_slashes(&relative.with_extension(""))
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
