//! Shared utilities for integration tests.
//!
//! Sites are temp directories whose functions are shell scripts; the
//! "compiler" copies each script to its artifact path and marks it
//! executable, so no toolchain is needed to exercise the full pipeline.
//! A script containing `BROKEN` fails to compile.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use fnserve::config::{CompilerConfig, FnServeConfig};
use fnserve::functions::FunctionRegistry;
use fnserve::http::HttpServer;
use fnserve::lifecycle::{startup, Shutdown};
use fnserve::{BuildError, Orchestrator};
use tokio::task::JoinHandle;

/// Handler that ignores its input and prints `text`.
pub fn text_handler(text: &str) -> String {
    format!("#!/bin/sh\ncat >/dev/null\nprintf '%s' '{text}'\n")
}

/// Handler that prints the request it was given.
pub const ECHO_HANDLER: &str = "#!/bin/sh\ncat\n";

/// Handler that fails with `message` on stderr.
pub fn failing_handler(message: &str) -> String {
    format!("#!/bin/sh\ncat >/dev/null\necho '{message}' >&2\nexit 1\n")
}

/// Config for a site rooted at `root` with shell-script functions.
pub fn site_config(root: &Path) -> FnServeConfig {
    let mut config = FnServeConfig::default();
    config.site.root = root.to_path_buf();
    config.build.extensions = vec!["sh".to_string()];
    config.build.debounce_ms = 50;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.compiler = CompilerConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "grep -q BROKEN \"$0\" && { echo 'syntax error' >&2; exit 1; }; cp \"$0\" \"$1\" && chmod +x \"$1\"".to_string(),
            "{source}".to_string(),
            "{output}".to_string(),
        ],
        release_args: vec![],
        parallelism: 2,
    };
    startup::resolve_site(config)
}

/// Temp site with the given `(relative path, script)` functions.
pub fn site(functions: &[(&str, &str)]) -> (TempDir, FnServeConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = site_config(dir.path());
    for (path, script) in functions {
        write_function(&config, path, script);
    }
    (dir, config)
}

pub fn write_function(config: &FnServeConfig, relative: &str, script: &str) {
    let path = config.functions_root().join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, script).unwrap();
}

/// One-shot build; returns the populated registry.
pub async fn build(config: &FnServeConfig) -> Arc<FunctionRegistry> {
    let registry = startup::open_registry(config);
    startup::orchestrator(config, registry.clone()).build().await.unwrap();
    registry
}

pub fn orchestrator(config: &FnServeConfig) -> Orchestrator {
    startup::orchestrator(config, startup::open_registry(config))
}

pub fn server(config: &FnServeConfig, registry: Arc<FunctionRegistry>) -> HttpServer {
    HttpServer::new(config, registry, startup::module_loader(config))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll `url` until it answers 200 with `expected`, for up to ten seconds.
pub async fn wait_for_body(client: &reqwest::Client, url: &str, expected: &str) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = client.get(url).send().await {
            if response.status().is_success() && response.text().await.map(|t| t == expected).unwrap_or(false) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Poll `url` until it answers with `status`, for up to ten seconds.
pub async fn wait_for_status(client: &reqwest::Client, url: &str, status: u16) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = client.get(url).send().await {
            if response.status().as_u16() == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// A site running in develop mode behind a real listener.
pub struct Develop {
    pub registry: Arc<FunctionRegistry>,
    pub client: reqwest::Client,
    addr: SocketAddr,
    shutdown: Shutdown,
    develop: JoinHandle<Result<(), BuildError>>,
    serve: JoinHandle<Result<(), std::io::Error>>,
}

impl Develop {
    pub async fn start(config: &FnServeConfig) -> Self {
        let orchestrator = Arc::new(orchestrator(config));
        let registry = orchestrator.registry().clone();
        let shutdown = Shutdown::new();

        let develop = tokio::spawn({
            let rx = shutdown.subscribe();
            async move { orchestrator.develop(rx).await }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serve = tokio::spawn(server(config, registry.clone()).run(listener, shutdown.subscribe()));

        Self {
            registry,
            client: reqwest::Client::new(),
            addr,
            shutdown,
            develop,
            serve,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn wait_for_body(&self, path: &str, expected: &str) -> bool {
        wait_for_body(&self.client, &self.url(path), expected).await
    }

    pub async fn wait_for_status(&self, path: &str, status: u16) -> bool {
        wait_for_status(&self.client, &self.url(path), status).await
    }

    /// Poll until the registry has moved past `generation`.
    pub async fn wait_for_generation_after(&self, generation: u64) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            if self.registry.snapshot().generation() > generation {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.develop.await.unwrap().unwrap();
        self.serve.await.unwrap().unwrap();
    }
}
