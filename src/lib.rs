//! fnserve: file-routed functions, compiled and served over HTTP.
//!
//! Every source file under the functions root becomes an endpoint under the
//! API prefix. `src/api/users/[id].rs` is served at `/api/users/:id`.

pub mod build;
pub mod config;
pub mod dispatch;
pub mod functions;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use build::{BuildError, BuildState, Orchestrator};
pub use config::FnServeConfig;
pub use functions::{FunctionDescriptor, FunctionRegistry};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
