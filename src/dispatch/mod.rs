//! Function dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedFunction + HandlerRequest
//!     → cache.rs (reuse handler unless generation or mtime changed)
//!     → handler.rs (spawn artifact, JSON on stdin, reply on stdout)
//!     → dispatcher.rs (timing, logging, failure → 500)
//!     → HandlerResponse
//! ```
//!
//! # Design Decisions
//! - A failing function never takes the server down
//! - Handlers are processes: a crash is contained in the child
//! - The loader is a trait so embedders can supply in-process handlers

pub mod cache;
pub mod dispatcher;
pub mod handler;

pub use cache::{ModuleCache, ModuleLoader, ProcessLoader};
pub use dispatcher::Dispatcher;
pub use handler::{Handler, HandlerError, HandlerRequest, HandlerResponse, ProcessHandler, RequestBody};
