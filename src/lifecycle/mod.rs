//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Registry + compiler + loader → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → watch loop stops → server drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then build, then listeners
//! - In develop mode the server starts before the first compile finishes;
//!   requests to not-yet-compiled functions fall through

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
