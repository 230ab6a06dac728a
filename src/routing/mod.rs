//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path fragment (API prefix stripped)
//!     → router.rs (exact lookup, then ordered pattern scan)
//!     → matcher.rs (compiled parameter patterns)
//!     → Return: ResolvedFunction or NoMatch
//!
//! Pattern Compilation (per registry generation):
//!     FunctionDescriptor.match_pattern
//!     → matcher.rs compiles to anchored regex
//!     → frozen inside the immutable RegistrySnapshot
//! ```
//!
//! # Design Decisions
//! - Deterministic: same snapshot and fragment always match the same function
//! - Exact match wins, then first pattern in registry order
//! - No match is not an error; the HTTP layer defers to the next service

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern};
pub use router::{resolve, ResolvedFunction, Router};
