//! The function registry.
//!
//! # Responsibilities
//! - Hold the ordered set of descriptors for the current generation
//! - Swap the whole set atomically on every compile cycle
//! - Persist a manifest after each swap (best effort)
//!
//! # Design Decisions
//! - `ArcSwap<RegistrySnapshot>`: readers never lock and never see a torn set
//! - Snapshots are immutable; patterns are compiled when a snapshot is built
//! - Exact lookup is O(1); on duplicate routes the first in order wins

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use arc_swap::ArcSwap;
use crate::functions::descriptor::FunctionDescriptor;
use crate::functions::manifest;
use crate::observability::metrics;
use crate::routing::matcher::PathPattern;

/// An immutable view of the registry for one generation.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    functions: Vec<FunctionDescriptor>,
    /// Compiled patterns, aligned with `functions`.
    patterns: Vec<Option<PathPattern>>,
    exact: HashMap<String, usize>,
}

impl RegistrySnapshot {
    /// Build a snapshot, compiling every match pattern.
    pub fn new(generation: u64, functions: Vec<FunctionDescriptor>) -> Self {
        let mut exact = HashMap::with_capacity(functions.len());
        let mut patterns = Vec::with_capacity(functions.len());

        for (i, f) in functions.iter().enumerate() {
            exact.entry(f.route.clone()).or_insert(i);

            let compiled = f.match_pattern.as_deref().and_then(|p| match PathPattern::compile(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(source = %f.source_path, error = %e, "Skipping unmatchable pattern");
                    None
                }
            });
            patterns.push(compiled);
        }

        Self {
            generation,
            functions,
            patterns,
            exact,
        }
    }

    /// Generation counter; bumped on every successful compile cycle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All descriptors in registry order.
    pub fn all(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Find the descriptor whose route equals `route` exactly.
    pub fn find_exact(&self, route: &str) -> Option<&FunctionDescriptor> {
        self.exact.get(route).map(|&i| &self.functions[i])
    }

    /// Descriptors with a compiled pattern, in registry order.
    pub fn patterns(&self) -> impl Iterator<Item = (&FunctionDescriptor, &PathPattern)> {
        self.functions
            .iter()
            .zip(self.patterns.iter())
            .filter_map(|(f, p)| p.as_ref().map(|p| (f, p)))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Shared handle to the current registry snapshot.
///
/// Owned and written by the build orchestrator; the router and dispatcher
/// only ever read snapshots out of it.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    current: ArcSwap<RegistrySnapshot>,
    manifest_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl FunctionRegistry {
    /// Create an empty registry that does not persist a manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that writes a manifest to `path` after each swap.
    pub fn with_manifest(path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Current snapshot. Holders keep their view even if a swap happens later.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Atomically replace the whole descriptor set with a new generation.
    pub fn replace(&self, functions: Vec<FunctionDescriptor>) -> Arc<RegistrySnapshot> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let generation = self.current.load().generation + 1;
        let snapshot = Arc::new(RegistrySnapshot::new(generation, functions));
        self.current.store(snapshot.clone());

        metrics::record_registry_size(snapshot.len());
        tracing::debug!(generation, functions = snapshot.len(), "Function registry replaced");

        if let Some(path) = &self.manifest_path {
            if let Err(e) = manifest::write_manifest(path, snapshot.all()) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write functions manifest");
            }
        }

        snapshot
    }

    /// Owned copy of the descriptor whose route equals `route`.
    pub fn find_exact(&self, route: &str) -> Option<FunctionDescriptor> {
        self.current.load().find_exact(route).cloned()
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }
}
