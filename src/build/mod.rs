//! Build subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (orchestrator.rs)
//!     Idle → Discovering → Compiling → { Watching | Done }
//!                                  ↘ Failed
//!
//! Discovering:
//!     functions root → discovery → descriptors → CompileJob + defines
//!
//! Compiling (compiler.rs / command.rs):
//!     CompileJob → external program per entry → artifacts + diagnostics
//!     → registry swap (only functions with artifacts)
//!
//! Watching (watcher.rs):
//!     env file change | add/remove in functions tree
//!     → debounce → stop session → Discovering → Compiling → new session
//!     content edit in functions tree → compiler's own session recompiles
//! ```

pub mod command;
pub mod compiler;
pub mod orchestrator;
pub mod watcher;

pub use command::CommandCompiler;
pub use compiler::{CompileJob, CompileMode, CompileReport, Compiler, Diagnostics, WatchHandle};
pub use orchestrator::{BuildError, BuildState, Orchestrator};
