//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the shared registry, compiler and module loader
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The site root is made absolute once, so artifact paths in the
//!   registry and manifest are absolute
//! - `serve` loads the persisted manifest and never writes it back

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use crate::build::orchestrator::absolute;
use crate::build::{CommandCompiler, Compiler, Orchestrator};
use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::FnServeConfig;
use crate::dispatch::{ModuleLoader, ProcessLoader};
use crate::functions::manifest::{load_manifest, ManifestError, MANIFEST_FILE};
use crate::functions::FunctionRegistry;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "fnserve.toml";

/// Load configuration from `path`, or from `fnserve.toml` when present,
/// or fall back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<FnServeConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        return load_config(default_path);
    }

    let config = FnServeConfig::default();
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Make the site root absolute.
pub fn resolve_site(mut config: FnServeConfig) -> FnServeConfig {
    config.site.root = absolute(&config.site.root);
    config
}

/// Location of the manifest inside the compiled output directory.
pub fn manifest_path(config: &FnServeConfig) -> PathBuf {
    config.output_dir().join(MANIFEST_FILE)
}

/// Registry that persists a manifest after every swap.
pub fn open_registry(config: &FnServeConfig) -> Arc<FunctionRegistry> {
    Arc::new(FunctionRegistry::with_manifest(manifest_path(config)))
}

/// Registry populated from a previously written manifest.
pub fn load_registry(config: &FnServeConfig) -> Result<Arc<FunctionRegistry>, ManifestError> {
    let path = manifest_path(config);
    let functions = load_manifest(&path)?;

    let registry = Arc::new(FunctionRegistry::new());
    let snapshot = registry.replace(functions);
    tracing::info!(
        manifest = %path.display(),
        functions = snapshot.len(),
        "Loaded functions manifest"
    );
    Ok(registry)
}

pub fn orchestrator(config: &FnServeConfig, registry: Arc<FunctionRegistry>) -> Orchestrator {
    let compiler: Arc<dyn Compiler> = Arc::new(CommandCompiler::new(config.compiler.clone()));
    Orchestrator::new(config.clone(), registry, compiler)
}

pub fn module_loader(config: &FnServeConfig) -> Arc<dyn ModuleLoader> {
    Arc::new(ProcessLoader::new(Duration::from_secs(config.server.handler_timeout_secs)))
}

pub async fn bind(config: &FnServeConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::manifest::write_manifest;
    use crate::functions::FunctionDescriptor;

    #[test]
    fn test_explicit_config_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:9999\"\n").unwrap();

        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
    }

    #[test]
    fn test_resolve_site_is_absolute() {
        let config = resolve_site(FnServeConfig::default());
        assert!(config.site.root.is_absolute());
        assert!(manifest_path(&config).ends_with(".cache/functions/manifest.json"));
    }

    #[test]
    fn test_load_registry_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FnServeConfig::default();
        config.site.root = dir.path().to_path_buf();

        let out = config.output_dir();
        let functions = vec![
            FunctionDescriptor::from_source(Path::new("hello.rs"), &out),
            FunctionDescriptor::from_source(Path::new("users/[id].rs"), &out),
        ];
        write_manifest(&manifest_path(&config), &functions).unwrap();

        let registry = load_registry(&config).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.generation(), 1);
        assert!(registry.find_exact("hello").is_some());
        assert!(registry.manifest_path().is_none());
    }

    #[test]
    fn test_load_registry_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FnServeConfig::default();
        config.site.root = dir.path().to_path_buf();
        assert!(matches!(load_registry(&config), Err(ManifestError::Io(_))));
    }
}
