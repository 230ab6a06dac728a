//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, concurrency limit)
//!     → request.rs (strip API prefix, parse cookies/query/body)
//!     → [routing resolves fragment to a function] or → fallback service
//!     → [dispatch runs the function]
//!     → response.rs (function response → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{path_fragment, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
