//! Site watcher for structural changes.
//!
//! # Responsibilities
//! - Watch env files at the site root and the whole functions tree
//! - Decide which events require a full rediscover-and-recompile
//!
//! # Design Decisions
//! - Content edits inside the functions tree are left to the compiler's
//!   own watch session
//! - Additions, removals and renames inside the tree restart, as does any
//!   change to an env file
//! - Paths discovery would never pick up (hidden entries, ignored
//!   directories, other extensions) never restart
//! - Access and unclassified events never restart

use std::path::{Path, PathBuf};
use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use crate::config::env::is_env_file;
use crate::functions::discovery::{has_extension, is_excluded, DiscoveryOptions};

/// Paths the orchestrator cares about, in configured and canonical form.
#[derive(Debug, Clone)]
pub struct WatchScope {
    site_roots: Vec<PathBuf>,
    functions_roots: Vec<PathBuf>,
    discovery: DiscoveryOptions,
}

impl WatchScope {
    pub fn new(site_root: &Path, functions_root: &Path, discovery: DiscoveryOptions) -> Self {
        Self {
            site_roots: with_canonical(site_root),
            functions_roots: with_canonical(functions_root),
            discovery,
        }
    }

    /// Returns the path that makes `event` a restart trigger, if any.
    pub fn restart_trigger(&self, event: &Event) -> Option<PathBuf> {
        if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
            return None;
        }

        event.paths.iter().find(|path| self.is_trigger(&event.kind, path)).cloned()
    }

    fn is_trigger(&self, kind: &EventKind, path: &Path) -> bool {
        if let Some(relative) = self.relative_to_functions(path) {
            return !is_content_modification(kind) && self.is_discoverable(relative, path);
        }
        is_env_file(path) && path.parent().map(|p| self.is_site_root(p)).unwrap_or(false)
    }

    fn relative_to_functions<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        self.functions_roots.iter().find_map(|root| path.strip_prefix(root).ok())
    }

    /// Whether the path could be, or could contain, a discovered source.
    /// Removed paths no longer exist, so anything without an extension is
    /// treated as a directory.
    fn is_discoverable(&self, relative: &Path, path: &Path) -> bool {
        if is_excluded(relative, &self.discovery) {
            return false;
        }
        if has_extension(path, &self.discovery.extensions) {
            return true;
        }
        path.extension().is_none() && !path.is_file()
    }

    fn is_site_root(&self, dir: &Path) -> bool {
        self.site_roots.iter().any(|root| root == dir)
    }

    pub fn site_root(&self) -> &Path {
        &self.site_roots[0]
    }

    pub fn functions_root(&self) -> &Path {
        &self.functions_roots[0]
    }
}

fn is_content_modification(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) | EventKind::Modify(ModifyKind::Metadata(_))
    )
}

fn with_canonical(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize() {
        if canonical != path {
            paths.push(canonical);
        }
    }
    paths
}

/// Raw watch events, fed to the orchestrator's restart loop.
pub type WatchEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Start watching the site root (non-recursive) and the functions tree.
///
/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch_site(scope: &WatchScope) -> Result<(RecommendedWatcher, WatchEvents), notify::Error> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;

    watcher.watch(scope.site_root(), RecursiveMode::NonRecursive)?;
    watcher.watch(scope.functions_root(), RecursiveMode::Recursive)?;

    tracing::info!(
        site = %scope.site_root().display(),
        functions = %scope.functions_root().display(),
        "Function watcher started"
    );
    Ok((watcher, rx))
}
