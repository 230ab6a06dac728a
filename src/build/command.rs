//! Compiler backed by an external command.
//!
//! # Responsibilities
//! - Run the configured program once per entry with placeholder substitution
//! - Export the define table as the compiler process environment
//! - Turn exit status and stderr into error and warning diagnostics
//! - In watch mode, recompile only the entries whose sources were edited
//!
//! # Design Decisions
//! - Entries compile concurrently, bounded by `compiler.parallelism`
//! - A failing entry is a diagnostic; only a program that cannot start is a
//!   `CompileError`
//! - Watch events are coalesced over a short window before recompiling

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::build::compiler::{
    CompileError, CompileJob, CompileMode, CompileReport, Compiler, CycleCallback, Diagnostics, WatchHandle,
};
use crate::config::CompilerConfig;

const COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// Runs `compiler.program` for every entry.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    config: Arc<CompilerConfig>,
}

impl CommandCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, job: CompileJob) -> BoxFuture<'static, Result<CompileReport, CompileError>> {
        let config = self.config.clone();
        Box::pin(async move {
            let job = Arc::new(job);
            let entries: Vec<_> = job.entries.keys().cloned().collect();
            compile_entries(config, job, entries).await
        })
    }

    fn watch(&self, job: CompileJob, on_cycle: CycleCallback) -> Result<Box<dyn WatchHandle>, CompileError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        if job.source_root.is_dir() {
            watcher.watch(&job.source_root, RecursiveMode::Recursive)?;
        }

        let config = self.config.clone();
        let job = Arc::new(job);
        let by_source = EntryIndex::new(&job);

        let task = tokio::spawn(async move {
            let all: Vec<_> = job.entries.keys().cloned().collect();
            on_cycle(compile_entries(config.clone(), job.clone(), all).await);

            while let Some(first) = rx.recv().await {
                let mut changed = BTreeSet::new();
                collect_edited(&first, &by_source, &mut changed);

                tokio::time::sleep(COALESCE_WINDOW).await;
                while let Ok(next) = rx.try_recv() {
                    collect_edited(&next, &by_source, &mut changed);
                }

                if changed.is_empty() {
                    continue;
                }

                tracing::debug!(entries = ?changed, "Recompiling edited functions");
                let result = compile_entries(config.clone(), job.clone(), changed.into_iter().collect()).await;
                on_cycle(result);
            }
        });

        Ok(Box::new(CommandWatch { watcher, task }))
    }
}

struct CommandWatch {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle for CommandWatch {
    fn stop(self: Box<Self>) -> BoxFuture<'static, ()> {
        let CommandWatch { watcher, task } = *self;
        drop(watcher);
        task.abort();
        Box::pin(async move {
            let _ = task.await;
        })
    }
}

/// Maps watched paths back to entry names.
///
/// Backends may report canonical paths, so both the configured and the
/// canonical source root are tried.
struct EntryIndex {
    roots: Vec<PathBuf>,
    entries: BTreeMap<PathBuf, String>,
}

impl EntryIndex {
    fn new(job: &CompileJob) -> Self {
        let mut roots = vec![job.source_root.clone()];
        if let Ok(canonical) = job.source_root.canonicalize() {
            if canonical != job.source_root {
                roots.push(canonical);
            }
        }
        let entries = job
            .entries
            .iter()
            .filter_map(|(entry, source)| {
                let relative = source.strip_prefix(&job.source_root).ok()?;
                Some((relative.to_path_buf(), entry.clone()))
            })
            .collect();
        Self { roots, entries }
    }

    fn get(&self, path: &Path) -> Option<&String> {
        self.roots
            .iter()
            .filter_map(|root| path.strip_prefix(root).ok())
            .find_map(|relative| self.entries.get(relative))
    }
}

fn collect_edited(event: &notify::Result<Event>, by_source: &EntryIndex, out: &mut BTreeSet<String>) {
    let event = match event {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "Compiler watch error");
            return;
        }
    };
    if !matches!(event.kind, EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)) {
        return;
    }
    for path in &event.paths {
        if let Some(entry) = by_source.get(path) {
            out.insert(entry.clone());
        }
    }
}

async fn compile_entries(
    config: Arc<CompilerConfig>,
    job: Arc<CompileJob>,
    entries: Vec<String>,
) -> Result<CompileReport, CompileError> {
    let parallelism = config.parallelism.max(1);
    let outcomes: Vec<Result<EntryOutcome, CompileError>> = stream::iter(entries)
        .map(|entry| compile_entry(config.clone(), job.clone(), entry))
        .buffer_unordered(parallelism)
        .collect()
        .await;

    let mut report = CompileReport::default();
    for outcome in outcomes {
        let outcome = outcome?;
        report.artifacts.extend(outcome.artifact);
        report.diagnostics.extend(outcome.diagnostics);
    }
    report.artifacts.sort();
    report.diagnostics.errors.sort();
    report.diagnostics.warnings.sort();
    Ok(report)
}

struct EntryOutcome {
    artifact: Option<PathBuf>,
    diagnostics: Diagnostics,
}

async fn compile_entry(config: Arc<CompilerConfig>, job: Arc<CompileJob>, entry: String) -> Result<EntryOutcome, CompileError> {
    let mut diagnostics = Diagnostics::default();
    let Some(source) = job.entries.get(&entry) else {
        return Ok(EntryOutcome { artifact: None, diagnostics });
    };

    let output = job.artifact_path(&entry);
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut args = substitute(&config.args, &entry, source, &output);
    if job.mode == CompileMode::OneShot {
        args.extend(substitute(&config.release_args, &entry, source, &output));
    }

    let result = Command::new(&config.program)
        .args(&args)
        .envs(&job.defines)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CompileError::Spawn {
            program: config.program.clone(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
    if result.status.success() {
        if !stderr.is_empty() {
            diagnostics.warnings.push(format!("{}: {}", entry, stderr));
        }
        Ok(EntryOutcome {
            artifact: Some(output),
            diagnostics,
        })
    } else {
        let message = if stderr.is_empty() {
            format!("compiler exited with {}", result.status)
        } else {
            stderr
        };
        diagnostics.errors.push(format!("{}: {}", entry, message));
        Ok(EntryOutcome {
            artifact: None,
            diagnostics,
        })
    }
}

fn substitute(args: &[String], entry: &str, source: &Path, output: &Path) -> Vec<String> {
    let source = source.display().to_string();
    let output = output.display().to_string();
    args.iter()
        .map(|a| {
            a.replace("{source}", &source)
                .replace("{output}", &output)
                .replace("{entry}", entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::compiler::Target;

    #[test]
    fn test_substitute_placeholders() {
        let args = vec!["{source}".to_string(), "-o".to_string(), "{output}".to_string(), "--name={entry}".to_string()];
        let out = substitute(&args, "greet/[name]", Path::new("/src/greet/[name].rs"), Path::new("/out/greet/[name]"));
        assert_eq!(out, vec!["/src/greet/[name].rs", "-o", "/out/greet/[name]", "--name=greet/[name]"]);
    }

    #[cfg(unix)]
    fn copy_compiler(extra: &str) -> CommandCompiler {
        CommandCompiler::new(CompilerConfig {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                format!("{extra}cp \"$0\" \"$1\" && chmod +x \"$1\""),
                "{source}".into(),
                "{output}".into(),
            ],
            release_args: vec![],
            parallelism: 2,
        })
    }

    #[cfg(unix)]
    fn job(root: &Path, names: &[&str]) -> CompileJob {
        let src = root.join("src");
        std::fs::create_dir_all(&src).unwrap();
        let mut entries = BTreeMap::new();
        for name in names {
            let path = src.join(format!("{name}.sh"));
            std::fs::write(&path, "#!/bin/sh\necho hi\n").unwrap();
            entries.insert(name.to_string(), path);
        }
        CompileJob {
            source_root: src,
            entries,
            output_dir: root.join("out"),
            target: Target::ServerExecutable,
            defines: BTreeMap::from([("GREETING".to_string(), "hello".to_string())]),
            mode: CompileMode::OneShot,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compiles_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), &["a", "b"]);
        let report = copy_compiler("").compile(job.clone()).await.unwrap();

        assert!(!report.diagnostics.has_errors());
        assert_eq!(report.artifacts, vec![job.artifact_path("a"), job.artifact_path("b")]);
        assert!(job.artifact_path("a").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_defines_reach_compiler_environment() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), &["a"]);
        let report = copy_compiler("test \"$GREETING\" = hello || exit 3; ").compile(job).await.unwrap();
        assert!(report.diagnostics.errors.is_empty(), "{:?}", report.diagnostics);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_and_warning_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), &["a"]);

        let report = copy_compiler("echo 'syntax error' >&2; exit 1; ").compile(job.clone()).await.unwrap();
        assert_eq!(report.diagnostics.errors, vec!["a: syntax error"]);
        assert!(report.artifacts.is_empty());

        let report = copy_compiler("echo 'unused variable' >&2; ").compile(job).await.unwrap();
        assert!(report.diagnostics.errors.is_empty());
        assert_eq!(report.diagnostics.warnings, vec!["a: unused variable"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.rs");
        std::fs::write(&source, "").unwrap();
        let job = CompileJob {
            source_root: dir.path().to_path_buf(),
            entries: BTreeMap::from([("a".to_string(), source)]),
            output_dir: dir.path().join("out"),
            target: Target::ServerExecutable,
            defines: BTreeMap::new(),
            mode: CompileMode::OneShot,
        };
        let compiler = CommandCompiler::new(CompilerConfig {
            program: "definitely-not-a-real-compiler-binary".into(),
            ..CompilerConfig::default()
        });

        let err = compiler.compile(job).await.unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_watch_recompiles_edited_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), &["a", "b"]);
        job.mode = CompileMode::Watch;
        let source_a = job.entries["a"].clone();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = copy_compiler("")
            .watch(job, Arc::new(move |r: Result<CompileReport, CompileError>| {
                let _ = tx.send(r.map(|r| r.artifacts.len()));
            }))
            .unwrap();

        let initial = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
        assert_eq!(initial.unwrap(), 2);

        std::fs::write(&source_a, "#!/bin/sh\necho changed\n").unwrap();
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
        assert_eq!(next.unwrap(), 1);

        handle.stop().await;
    }
}
