//! Loaded-module cache.
//!
//! A handler is reused across requests only while both the registry
//! generation and the artifact's modification time are unchanged, so a
//! rebuilt artifact is picked up on the very next request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use dashmap::DashMap;
use crate::dispatch::handler::{Handler, HandlerError, ProcessHandler};

/// Turns an artifact on disk into an invocable handler.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, artifact: &Path) -> Result<Arc<dyn Handler>, HandlerError>;
}

/// Loads artifacts as child-process handlers.
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    timeout: Duration,
}

impl ProcessLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ModuleLoader for ProcessLoader {
    fn load(&self, artifact: &Path) -> Result<Arc<dyn Handler>, HandlerError> {
        let metadata = std::fs::metadata(artifact).map_err(|_| HandlerError::Missing(artifact.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(HandlerError::Missing(artifact.to_path_buf()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(HandlerError::NotExecutable(artifact.to_path_buf()));
            }
        }

        Ok(Arc::new(ProcessHandler::new(artifact, self.timeout)))
    }
}

struct CachedModule {
    generation: u64,
    modified: SystemTime,
    handler: Arc<dyn Handler>,
}

/// Per-artifact handler cache keyed by generation and mtime.
pub struct ModuleCache {
    loader: Arc<dyn ModuleLoader>,
    modules: DashMap<PathBuf, CachedModule>,
}

impl ModuleCache {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            modules: DashMap::new(),
        }
    }

    /// Handler for `artifact`, reloading it if it changed since last use.
    pub fn get(&self, artifact: &Path, generation: u64) -> Result<Arc<dyn Handler>, HandlerError> {
        let modified = match std::fs::metadata(artifact).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => {
                self.modules.remove(artifact);
                return Err(HandlerError::Missing(artifact.to_path_buf()));
            }
        };

        let cached = self
            .modules
            .get(artifact)
            .filter(|m| m.generation == generation && m.modified == modified)
            .map(|m| m.handler.clone());
        if let Some(handler) = cached {
            return Ok(handler);
        }

        let handler = self.loader.load(artifact)?;
        tracing::debug!(artifact = %artifact.display(), generation, "Loaded function module");
        self.modules.insert(
            artifact.to_path_buf(),
            CachedModule {
                generation,
                modified,
                handler: handler.clone(),
            },
        );
        Ok(handler)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
