//! The compiler collaborator interface.
//!
//! The orchestrator treats the toolchain as a black box: it hands over one
//! entry per function plus the define table, and gets back artifacts and
//! diagnostics. One-shot compiles return once; watch sessions report every
//! cycle through a callback until stopped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use futures_util::future::BoxFuture;
use thiserror::Error;

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Standalone executable run by the dispatcher.
    ServerExecutable,
}

/// Whether a compile is a one-off or a long-lived watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    OneShot,
    Watch,
}

/// Everything the compiler needs for one generation.
#[derive(Debug, Clone)]
pub struct CompileJob {
    /// Functions source root; watch sessions observe it.
    pub source_root: PathBuf,
    /// Entry name (source path without extension) → absolute source path.
    pub entries: BTreeMap<String, PathBuf>,
    /// Where artifacts are written, mirroring entry names.
    pub output_dir: PathBuf,
    pub target: Target,
    /// Constant-substitution table.
    pub defines: BTreeMap<String, String>,
    pub mode: CompileMode,
}

impl CompileJob {
    /// Artifact location for an entry name.
    pub fn artifact_path(&self, entry: &str) -> PathBuf {
        let file = format!("{}{}", entry, std::env::consts::EXE_SUFFIX);
        file.split('/').fold(self.output_dir.clone(), |acc, part| acc.join(part))
    }
}

/// Errors and warnings reported by one compile cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Result of one compile cycle.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    /// Artifacts written during this cycle.
    pub artifacts: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

/// The compiler itself could not run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to spawn compiler {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiler I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start compiler watch: {0}")]
    Watch(#[from] notify::Error),
}

/// Called after every watch cycle.
pub type CycleCallback = Arc<dyn Fn(Result<CompileReport, CompileError>) + Send + Sync>;

/// A running watch session.
pub trait WatchHandle: Send {
    /// Stop watching; resolves once no further cycles will be reported.
    fn stop(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Black-box compiler.
pub trait Compiler: Send + Sync {
    /// Compile every entry once.
    fn compile(&self, job: CompileJob) -> BoxFuture<'static, Result<CompileReport, CompileError>>;

    /// Compile every entry, then keep recompiling edited sources until stopped.
    fn watch(&self, job: CompileJob, on_cycle: CycleCallback) -> Result<Box<dyn WatchHandle>, CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_mirrors_entry() {
        let job = CompileJob {
            source_root: PathBuf::from("/site/src/api"),
            entries: BTreeMap::new(),
            output_dir: PathBuf::from("/site/.cache/functions"),
            target: Target::ServerExecutable,
            defines: BTreeMap::new(),
            mode: CompileMode::OneShot,
        };
        assert_eq!(
            job.artifact_path("greet/[name]"),
            PathBuf::from("/site/.cache/functions/greet")
                .join(format!("[name]{}", std::env::consts::EXE_SUFFIX))
        );
    }

    #[test]
    fn test_diagnostics_extend() {
        let mut d = Diagnostics::default();
        assert!(!d.has_errors());
        d.extend(Diagnostics {
            errors: vec!["boom".into()],
            warnings: vec!["careful".into()],
        });
        assert!(d.has_errors());
        assert_eq!(d.warnings, vec!["careful"]);
    }
}
