//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for fnserve.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FnServeConfig {
    /// Site layout (functions root, compiled output, public dir).
    pub site: SiteConfig,

    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// HTTP surface settings.
    pub server: ServerConfig,

    /// Discovery and watch settings.
    pub build: BuildConfig,

    /// Environment name resolution.
    pub environment: EnvironmentConfig,

    /// External compiler invocation.
    pub compiler: CompilerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl FnServeConfig {
    /// Absolute-or-relative path of the functions source root.
    pub fn functions_root(&self) -> PathBuf {
        self.site.root.join(&self.site.functions_dir)
    }

    /// Directory that receives compiled artifacts and the manifest.
    pub fn output_dir(&self) -> PathBuf {
        self.site.root.join(&self.site.cache_dir)
    }

    /// Public output directory exposed to handlers as `PUBLIC_DIR`.
    pub fn public_dir(&self) -> PathBuf {
        self.site.root.join(&self.site.public_dir)
    }
}

/// Site layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root; env files are looked up here.
    pub root: PathBuf,

    /// Functions source root, relative to the site root.
    pub functions_dir: PathBuf,

    /// Compiled output directory, relative to the site root.
    pub cache_dir: PathBuf,

    /// Public output directory, relative to the site root.
    pub public_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            functions_dir: PathBuf::from("src/api"),
            cache_dir: PathBuf::from(".cache/functions"),
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_connections: 1_024,
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Shared prefix all functions are mounted under.
    pub api_prefix: String,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Time a single handler process may run, in seconds.
    pub handler_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            request_timeout_secs: 30,
            handler_timeout_secs: 10,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Discovery and watch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Source extensions, without the leading dot.
    pub extensions: Vec<String>,

    /// Directory names never descended into.
    pub ignored_dirs: Vec<String>,

    /// Quiet period before a watch-triggered restart, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["rs".to_string()],
            ignored_dirs: vec!["node_modules".to_string(), "target".to_string()],
            debounce_ms: 250,
        }
    }
}

/// Environment name resolution.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Explicit active environment; takes precedence over `APP_ACTIVE_ENV`.
    pub active_env: Option<String>,
}

/// External compiler invocation.
///
/// `args` may use `{source}`, `{output}` and `{entry}` placeholders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Program to run once per entry.
    pub program: String,

    /// Arguments for every compile.
    pub args: Vec<String>,

    /// Extra arguments appended in one-shot mode.
    pub release_args: Vec<String>,

    /// Maximum entries compiled concurrently.
    pub parallelism: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "rustc".to_string(),
            args: vec![
                "--edition=2021".to_string(),
                "--crate-name=handler".to_string(),
                "{source}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
            ],
            release_args: vec!["-O".to_string()],
            parallelism: 4,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the Prometheus endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg: FnServeConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.api_prefix, "/api");
        assert_eq!(cfg.functions_root(), PathBuf::from("./src/api"));
        assert_eq!(cfg.output_dir(), PathBuf::from("./.cache/functions"));
    }

    #[test]
    fn test_partial_sections() {
        let cfg: FnServeConfig = toml::from_str(
            r#"
            [site]
            root = "/srv/site"

            [build]
            extensions = ["ts", "js"]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.functions_root(), PathBuf::from("/srv/site/src/api"));
        assert_eq!(cfg.build.extensions, vec!["ts", "js"]);
        assert_eq!(cfg.build.debounce_ms, 250);
        assert_eq!(cfg.observability.log_format, LogFormat::Json);
        assert_eq!(cfg.compiler.program, "rustc");
    }
}
