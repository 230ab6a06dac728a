//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the functions dispatcher in front of a fallback service
//! - Wire up middleware (timeout, request ID, tracing, concurrency limit)
//! - Bind server to listener and stop on shutdown
//!
//! # Design Decisions
//! - Paths outside the API prefix, and paths that resolve to no function,
//!   fall through to the fallback; the dispatcher never answers 404 itself
//! - The registry is read per request, so a rebuild is visible to the
//!   next request without restarting the server

use std::sync::Arc;
use std::time::Duration;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::FnServeConfig;
use crate::dispatch::{Dispatcher, ModuleLoader};
use crate::functions::FunctionRegistry;
use crate::http::request::{into_handler_request, path_fragment, UuidRequestId};
use crate::routing::Router as FunctionRouter;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub router: FunctionRouter,
    pub dispatcher: Arc<Dispatcher>,
    pub api_prefix: String,
    pub max_body_size: usize,
}

/// HTTP server for compiled functions.
pub struct HttpServer {
    state: AppState,
    fallback: Router,
    request_timeout: Duration,
    max_connections: usize,
}

impl HttpServer {
    /// Create a server reading functions from `registry`.
    pub fn new(config: &FnServeConfig, registry: Arc<FunctionRegistry>, loader: Arc<dyn ModuleLoader>) -> Self {
        let api_prefix = config.server.api_prefix.trim_end_matches('/').to_string();
        let state = AppState {
            router: FunctionRouter::new(registry),
            dispatcher: Arc::new(Dispatcher::new(loader, api_prefix.clone())),
            api_prefix,
            max_body_size: config.server.max_body_size,
        };

        Self {
            state,
            fallback: Router::new().fallback(|| async { StatusCode::NOT_FOUND }),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            max_connections: config.listener.max_connections,
        }
    }

    /// Service that receives every request the functions do not claim.
    /// Defaults to answering 404.
    pub fn with_fallback(mut self, fallback: Router) -> Self {
        self.fallback = fallback;
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        self.fallback
            .clone()
            .layer(middleware::from_fn_with_state(self.state.clone(), dispatch_functions))
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(GlobalConcurrencyLimitLayer::new(self.max_connections))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            api_prefix = %self.state.api_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.app())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Dispatch to a function when the path resolves to one, otherwise hand the
/// request to the next service.
async fn dispatch_functions(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let Some(fragment) = path_fragment(&state.api_prefix, request.uri().path()) else {
        return next.run(request).await;
    };

    let Some(resolved) = state.router.match_fragment(&fragment) else {
        tracing::debug!(path = %request.uri().path(), "No function matched");
        return next.run(request).await;
    };

    let handler_request = match into_handler_request(request, &resolved, state.max_body_size).await {
        Ok(r) => r,
        Err(rejection) => return rejection.into_response(),
    };

    state.dispatcher.dispatch(&resolved, handler_request).await.into_response()
}
