//! fnserve
//!
//! Compiles every function under the site's functions root and serves them
//! under the API prefix.
//!
//! # Architecture Overview
//!
//! ```text
//!     ┌───────────────────────── build ─────────────────────────┐
//!     │  discovery ─▶ descriptors ─▶ compiler ─▶ registry swap  │
//!     │      ▲                                      │           │
//!     │  watcher (develop only)                     ▼           │
//!     │                                          manifest.json  │
//!     └─────────────────────────────────────────────────────────┘
//!                                  │ snapshot
//!                                  ▼
//!     Client ─▶ http server ─▶ router ─▶ dispatcher ─▶ handler process
//!                    │ no match
//!                    ▼
//!                 fallback
//! ```
//!
//! # Commands
//!
//! - `develop`: build, watch and serve; compile errors are logged only
//! - `build`: compile once; exits non-zero on compile errors
//! - `serve`: serve a previously built site from its manifest

use std::path::PathBuf;
use std::sync::Arc;
use clap::{Parser, Subcommand};

use fnserve::config::loader::ConfigError;
use fnserve::config::validation::validate_config;
use fnserve::http::HttpServer;
use fnserve::lifecycle::signals::spawn_signal_handler;
use fnserve::lifecycle::startup;
use fnserve::lifecycle::Shutdown;
use fnserve::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "fnserve")]
#[command(about = "Build and serve file-routed functions", long_about = None)]
struct Cli {
    /// Config file (defaults to ./fnserve.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Site root, overriding `site.root`
    #[arg(long, global = true)]
    site: Option<PathBuf>,

    /// Bind address, overriding `listener.bind_address`
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, watch and serve functions
    Develop,
    /// Compile functions once
    Build,
    /// Serve already built functions
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = startup::load_or_default(cli.config.as_deref())?;
    if let Some(site) = cli.site {
        config.site.root = site;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    let config = startup::resolve_site(config);

    logging::init(config.observability.log_format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        site = %config.site.root.display(),
        functions = %config.functions_root().display(),
        "fnserve starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Build => {
            let registry = startup::open_registry(&config);
            let orchestrator = startup::orchestrator(&config, registry);
            let report = orchestrator.build().await?;
            tracing::info!(artifacts = report.artifacts.len(), "Build complete");
        }
        Commands::Develop => {
            let shutdown = Shutdown::new();
            spawn_signal_handler(shutdown.clone());

            let registry = startup::open_registry(&config);
            let orchestrator = Arc::new(startup::orchestrator(&config, registry.clone()));

            let listener = startup::bind(&config).await?;
            let server = HttpServer::new(&config, registry, startup::module_loader(&config));

            let build_task = tokio::spawn({
                let orchestrator = orchestrator.clone();
                let shutdown = shutdown.clone();
                let rx = shutdown.subscribe();
                async move {
                    if let Err(e) = orchestrator.develop(rx).await {
                        tracing::error!(error = %e, "Function watcher stopped");
                        shutdown.trigger();
                    }
                }
            });

            server.run(listener, shutdown.subscribe()).await?;
            shutdown.trigger();
            build_task.await?;
        }
        Commands::Serve => {
            let shutdown = Shutdown::new();
            spawn_signal_handler(shutdown.clone());

            let registry = startup::load_registry(&config)?;
            let listener = startup::bind(&config).await?;
            let server = HttpServer::new(&config, registry, startup::module_loader(&config));
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
