//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! fnserve.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FnServeConfig (validated, immutable)
//!     → shared by value with orchestrator and HTTP server
//!
//! Per build generation:
//!     env.rs resolves environment names
//!     → reads .env.<active> from the site root
//!     → merges with process env into compiler defines
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; env files are re-read every generation
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::FnServeConfig;
pub use schema::{BuildConfig, CompilerConfig, ListenerConfig, ObservabilityConfig, ServerConfig, SiteConfig};
