//! Build orchestration.
//!
//! # Responsibilities
//! - Discover sources and derive descriptors for each generation
//! - Resolve the define table and drive the compiler
//! - Publish each successful generation into the shared registry
//! - In interactive mode, restart everything on structural or env changes
//!
//! # Design Decisions
//! - One-shot compile errors are fatal; interactive ones are logged only
//! - The registry is swapped once a compile cycle completes and only lists
//!   functions whose artifact exists, so the dispatcher never sees a
//!   descriptor without an executable
//! - Restarts are full: stop the session, rediscover, recompile, rewatch
//! - Bursts of watch events inside the debounce window restart once

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use crate::build::compiler::{CompileError, CompileJob, CompileMode, CompileReport, Compiler, Target, WatchHandle};
use crate::build::watcher::{watch_site, WatchEvents, WatchScope};
use crate::config::env::{self, BuildMode};
use crate::config::FnServeConfig;
use crate::functions::discovery::{discover_sources, DiscoveryOptions};
use crate::functions::{FunctionDescriptor, FunctionRegistry};
use crate::observability::metrics;

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Discovering,
    Compiling,
    Watching,
    Done,
    Failed,
}

/// Errors that stop the orchestrator.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to discover functions: {0}")]
    Discovery(#[from] walkdir::Error),

    #[error("failed to prepare function directories: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Compiler(#[from] CompileError),

    #[error("failed to compile functions:\n{}", .0.join("\n"))]
    CompileFailed(Vec<String>),

    #[error("failed to watch site: {0}")]
    Watch(#[from] notify::Error),
}

/// Descriptors and compile job for one generation.
struct Generation {
    functions: Vec<FunctionDescriptor>,
    job: CompileJob,
}

/// Drives discovery, compilation and the interactive restart loop.
pub struct Orchestrator {
    config: FnServeConfig,
    registry: Arc<FunctionRegistry>,
    compiler: Arc<dyn Compiler>,
    state: Arc<watch::Sender<BuildState>>,
}

impl Orchestrator {
    /// Create an orchestrator. The site root is made absolute so artifact
    /// paths are absolute.
    pub fn new(mut config: FnServeConfig, registry: Arc<FunctionRegistry>, compiler: Arc<dyn Compiler>) -> Self {
        config.site.root = absolute(&config.site.root);
        let (state, _) = watch::channel(BuildState::Idle);
        Self {
            config,
            registry,
            compiler,
            state: Arc::new(state),
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<BuildState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &FnServeConfig {
        &self.config
    }

    /// One-shot mode: compile once; any compile error fails the build.
    pub async fn build(&self) -> Result<CompileReport, BuildError> {
        let result = self.build_once().await;
        match &result {
            Ok(_) => self.set_state(BuildState::Done),
            Err(e) => {
                self.set_state(BuildState::Failed);
                metrics::record_build("failed");
                tracing::error!(error = %e, "Failed to compile functions");
            }
        }
        result
    }

    async fn build_once(&self) -> Result<CompileReport, BuildError> {
        let generation = self.prepare(BuildMode::OneShot).await?;

        self.set_state(BuildState::Compiling);
        let report = self.compiler.compile(generation.job).await?;
        log_warnings(&report);

        if report.diagnostics.has_errors() {
            return Err(BuildError::CompileFailed(report.diagnostics.errors));
        }

        let snapshot = self.registry.replace(generation.functions);
        metrics::record_build("success");
        tracing::info!(
            functions = snapshot.len(),
            generation = snapshot.generation(),
            "Compiled functions"
        );
        Ok(report)
    }

    /// Interactive mode: compile, watch, and restart on structural changes
    /// until `shutdown` fires.
    pub async fn develop(&self, shutdown: broadcast::Receiver<()>) -> Result<(), BuildError> {
        tokio::fs::create_dir_all(self.config.functions_root()).await?;
        let scope = WatchScope::new(&self.config.site.root, &self.config.functions_root(), self.discovery_options());
        let (_watcher, events) = watch_site(&scope)?;
        self.run_interactive(scope, events, shutdown).await
    }

    async fn run_interactive(
        &self,
        scope: WatchScope,
        mut events: WatchEvents,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), BuildError> {
        let debounce = Duration::from_millis(self.config.build.debounce_ms);
        let mut session = Some(self.start_session().await.inspect_err(|_| self.set_state(BuildState::Failed))?);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Function watcher received shutdown signal");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let event = match event {
                        Ok(e) => e,
                        Err(e) => {
                            tracing::warn!(error = %e, "Watch error");
                            continue;
                        }
                    };
                    let Some(path) = scope.restart_trigger(&event) else { continue };

                    // Coalesce the burst that usually accompanies one change.
                    let stopping = tokio::select! {
                        _ = shutdown.recv() => true,
                        _ = tokio::time::sleep(debounce) => false,
                    };
                    if stopping {
                        tracing::info!("Function watcher received shutdown signal");
                        break;
                    }
                    while events.try_recv().is_ok() {}

                    tracing::info!(path = %path.display(), "Restarting function watcher due to change to \"{}\"", path.display());
                    if let Some(old) = session.take() {
                        old.stop().await;
                    }
                    match self.start_session().await {
                        Ok(s) => session = Some(s),
                        Err(e) => {
                            self.set_state(BuildState::Failed);
                            return Err(e);
                        }
                    }
                }
            }
        }

        if let Some(s) = session.take() {
            s.stop().await;
        }
        self.set_state(BuildState::Done);
        Ok(())
    }

    /// Discover, then hand a fresh job to the compiler's watch session.
    async fn start_session(&self) -> Result<Box<dyn WatchHandle>, BuildError> {
        let generation = self.prepare(BuildMode::Interactive).await?;
        self.set_state(BuildState::Compiling);

        let functions = Arc::new(generation.functions);
        let registry = self.registry.clone();
        let state = self.state.clone();

        let on_cycle = Arc::new(move |result: Result<CompileReport, CompileError>| {
            match result {
                Ok(report) => {
                    log_warnings(&report);
                    if report.diagnostics.has_errors() {
                        metrics::record_build("failed");
                        for error in &report.diagnostics.errors {
                            tracing::error!(error = %error, "Failed to compile function");
                        }
                    } else {
                        metrics::record_build("success");
                        tracing::info!(artifacts = report.artifacts.len(), "Re-building functions");
                    }
                    publish_compiled(&registry, &functions);
                }
                Err(e) => {
                    metrics::record_build("failed");
                    tracing::error!(error = %e, "Function compiler failed");
                }
            }
            state.send_replace(BuildState::Watching);
        });

        Ok(self.compiler.watch(generation.job, on_cycle)?)
    }

    /// Discovery plus everything the compiler needs.
    async fn prepare(&self, mode: BuildMode) -> Result<Generation, BuildError> {
        self.set_state(BuildState::Discovering);

        let output_dir = self.config.output_dir();
        tokio::fs::create_dir_all(&output_dir).await?;

        let functions_root = self.config.functions_root();
        let files = discover_sources(&functions_root, &self.discovery_options())?;

        if files.is_empty() {
            tracing::warn!(
                "No functions found in directory: {}",
                self.config.site.functions_dir.display()
            );
        }

        let functions: Vec<FunctionDescriptor> = files
            .iter()
            .map(|f| FunctionDescriptor::from_source(f, &output_dir))
            .collect();

        let entries = files
            .iter()
            .zip(&functions)
            .map(|(file, f)| (f.entry_name(), functions_root.join(file)))
            .collect();

        let compile_mode = match mode {
            BuildMode::OneShot => CompileMode::OneShot,
            BuildMode::Interactive => CompileMode::Watch,
        };

        let job = CompileJob {
            source_root: functions_root,
            entries,
            output_dir,
            target: Target::ServerExecutable,
            defines: env::resolve_defines(&self.config, mode),
            mode: compile_mode,
        };

        tracing::debug!(functions = functions.len(), "Discovered functions");
        Ok(Generation { functions, job })
    }

    fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: self.config.build.extensions.clone(),
            ignored_dirs: self.config.build.ignored_dirs.clone(),
        }
    }

    fn set_state(&self, state: BuildState) {
        tracing::debug!(state = ?state, "Build state");
        self.state.send_replace(state);
    }
}

/// Swap in every descriptor whose artifact exists on disk.
fn publish_compiled(registry: &FunctionRegistry, functions: &[FunctionDescriptor]) {
    let ready: Vec<_> = functions
        .iter()
        .filter(|f| f.artifact_path.is_file())
        .cloned()
        .collect();

    if ready.len() < functions.len() {
        tracing::warn!(
            missing = functions.len() - ready.len(),
            "Some functions have no compiled artifact and are not routable"
        );
    }
    registry.replace(ready);
}

fn log_warnings(report: &CompileReport) {
    for warning in &report.diagnostics.warnings {
        tracing::warn!(warning = %warning, "Function compile warning");
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
