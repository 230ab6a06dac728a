//! Request path resolution against the function registry.
//!
//! # Responsibilities
//! - Resolve a path fragment (API prefix already stripped) to a function
//! - Extract path parameters for dynamic routes
//! - Return an explicit no-match so the caller can defer
//!
//! # Design Decisions
//! - Exact pass first: literal routes shadow any pattern
//! - Pattern pass in registry order, stopping at the first hit
//! - The resolved descriptor is an owned copy; a concurrent swap never
//!   affects a request that has already resolved

use std::sync::Arc;
use crate::functions::{FunctionDescriptor, FunctionRegistry, RegistrySnapshot};
use crate::routing::matcher::PathParams;

/// A function selected for a request.
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub function: FunctionDescriptor,
    pub params: PathParams,
    /// Generation of the snapshot the match was made against.
    pub generation: u64,
}

/// Resolve `fragment` against one snapshot.
pub fn resolve(snapshot: &RegistrySnapshot, fragment: &str) -> Option<ResolvedFunction> {
    if let Some(function) = snapshot.find_exact(fragment) {
        return Some(ResolvedFunction {
            function: function.clone(),
            params: PathParams::default(),
            generation: snapshot.generation(),
        });
    }

    snapshot.patterns().find_map(|(function, pattern)| {
        pattern.match_path(fragment).map(|params| ResolvedFunction {
            function: function.clone(),
            params,
            generation: snapshot.generation(),
        })
    })
}

/// Router reading from the shared registry handle.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<FunctionRegistry>,
}

impl Router {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve against whatever snapshot is current right now.
    pub fn match_fragment(&self, fragment: &str) -> Option<ResolvedFunction> {
        resolve(&self.registry.snapshot(), fragment)
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }
}
