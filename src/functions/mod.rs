//! Function discovery and registry subsystem.
//!
//! # Data Flow
//! ```text
//! functions root (src/api)
//!     → discovery.rs (walk, filter by extension, sort)
//!     → route.rs (relative path → route + match pattern)
//!     → descriptor.rs (route + source + artifact locations)
//!     → registry.rs (atomic snapshot swap)
//!     → manifest.rs (persisted snapshot for out-of-process tooling)
//! ```
//!
//! # Design Decisions
//! - Registry is replaced wholesale each generation, never patched
//! - Discovery order is lexicographic so pattern precedence is reproducible
//! - Overlapping dynamic routes are order-sensitive: the first in order wins

pub mod descriptor;
pub mod discovery;
pub mod manifest;
pub mod registry;
pub mod route;

pub use descriptor::FunctionDescriptor;
pub use registry::{FunctionRegistry, RegistrySnapshot};
