//! Request dispatch to compiled functions.

use std::sync::Arc;
use std::time::Instant;
use crate::dispatch::cache::{ModuleCache, ModuleLoader};
use crate::dispatch::handler::{HandlerRequest, HandlerResponse};
use crate::observability::metrics;
use crate::routing::ResolvedFunction;

/// Invokes resolved functions and contains their failures.
pub struct Dispatcher {
    modules: ModuleCache,
    api_prefix: String,
}

impl Dispatcher {
    pub fn new(loader: Arc<dyn ModuleLoader>, api_prefix: impl Into<String>) -> Self {
        Self {
            modules: ModuleCache::new(loader),
            api_prefix: api_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Run the resolved function. Never fails: handler errors become a 500
    /// naming the function's source file.
    pub async fn dispatch(&self, resolved: &ResolvedFunction, request: HandlerRequest) -> HandlerResponse {
        let function = &resolved.function;
        let request_id = request.request_id.clone().unwrap_or_default();
        tracing::debug!(route = %function.route, request_id = %request_id, "Running {}", function.route);

        let start = Instant::now();
        let result = match self.modules.get(&function.artifact_path, resolved.generation) {
            Ok(handler) => handler.invoke(request).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                metrics::record_invocation(&function.route, "success", elapsed);
                tracing::info!(
                    route = %function.route,
                    status = response.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    request_id = %request_id,
                    "Executed function \"{}/{}\" in {}ms",
                    self.api_prefix,
                    function.route,
                    elapsed.as_millis()
                );
                response
            }
            Err(e) => {
                metrics::record_invocation(&function.route, "error", elapsed);
                tracing::error!(
                    route = %function.route,
                    source = %function.source_path,
                    request_id = %request_id,
                    error = %e,
                    "Function failed"
                );
                HandlerResponse::server_error(format!(
                    "Error when executing function \"{}\": \"{}\"",
                    function.source_path, e
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use futures_util::future::BoxFuture;
    use crate::dispatch::handler::{Handler, HandlerError, RequestBody};
    use crate::functions::FunctionDescriptor;
    use crate::routing::PathParams;

    struct Throws;

    impl Handler for Throws {
        fn invoke(&self, _: HandlerRequest) -> BoxFuture<'static, Result<HandlerResponse, HandlerError>> {
            Box::pin(async { Err(HandlerError::Failed("kaboom".into())) })
        }
    }

    struct Echo;

    impl Handler for Echo {
        fn invoke(&self, req: HandlerRequest) -> BoxFuture<'static, Result<HandlerResponse, HandlerError>> {
            Box::pin(async move { Ok(HandlerResponse::from_output(req.route.into_bytes())) })
        }
    }

    struct FixedLoader(Arc<dyn Handler>);

    impl ModuleLoader for FixedLoader {
        fn load(&self, _: &Path) -> Result<Arc<dyn Handler>, HandlerError> {
            Ok(self.0.clone())
        }
    }

    fn resolved(dir: &Path, source: &str) -> ResolvedFunction {
        let function = FunctionDescriptor::from_source(Path::new(source), dir);
        std::fs::create_dir_all(function.artifact_path.parent().unwrap()).unwrap();
        std::fs::write(&function.artifact_path, "").unwrap();
        ResolvedFunction {
            function,
            params: PathParams::default(),
            generation: 1,
        }
    }

    fn request(route: &str) -> HandlerRequest {
        HandlerRequest {
            method: "GET".into(),
            route: route.into(),
            path: format!("/api/{route}"),
            params: PathParams::default(),
            query: Default::default(),
            headers: Default::default(),
            cookies: Default::default(),
            body: RequestBody::Empty,
            request_id: None,
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_500_with_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(FixedLoader(Arc::new(Throws))), "/api");

        let response = dispatcher.dispatch(&resolved(dir.path(), "boom.ts"), request("boom")).await;
        assert_eq!(response.status, 500);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "Error when executing function \"boom.ts\": \"kaboom\""
        );

        // Still serving.
        let dispatcher = Dispatcher::new(Arc::new(FixedLoader(Arc::new(Echo))), "/api");
        let response = dispatcher.dispatch(&resolved(dir.path(), "hello.ts"), request("hello")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello");
    }

    #[tokio::test]
    async fn test_missing_artifact_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(FixedLoader(Arc::new(Echo))), "/api");
        let mut r = resolved(dir.path(), "gone.ts");
        std::fs::remove_file(&r.function.artifact_path).unwrap();
        r.generation = 2;

        let response = dispatcher.dispatch(&r, request("gone")).await;
        assert_eq!(response.status, 500);
        assert!(String::from_utf8(response.body).unwrap().contains("gone.ts"));
    }
}
