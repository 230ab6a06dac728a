//! Environment resolution for compiled functions.
//!
//! # Responsibilities
//! - Resolve the build and active environment names
//! - Read `.env.<active>` from the site root
//! - Merge env-file values with the live process environment into the
//!   define table handed to the compiler
//!
//! # Design Decisions
//! - Process variables win over env-file variables on collision
//! - `APP_ENV` and `PUBLIC_DIR` are always forced, whatever either source says
//! - A missing env file is silent; any other read failure is a warning

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::config::schema::FnServeConfig;

/// Reserved define: build environment name.
pub const APP_ENV: &str = "APP_ENV";
/// Reserved define: public output directory.
pub const PUBLIC_DIR: &str = "PUBLIC_DIR";
/// Process variable overriding the active environment name.
pub const APP_ACTIVE_ENV: &str = "APP_ACTIVE_ENV";

/// Build mode; picks the default environment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Compile once, errors are fatal.
    OneShot,
    /// Compile and keep watching.
    Interactive,
}

impl BuildMode {
    fn default_env(self) -> &'static str {
        match self {
            BuildMode::OneShot => "production",
            BuildMode::Interactive => "development",
        }
    }
}

/// Resolved environment names for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentNames {
    /// Forced into the define table as `APP_ENV`.
    pub build_env: String,
    /// Selects `.env.<active_env>`.
    pub active_env: String,
}

/// Resolve environment names from config, then `vars`, then the mode default.
pub fn resolve_names(
    config: &FnServeConfig,
    mode: BuildMode,
    vars: &BTreeMap<String, String>,
) -> EnvironmentNames {
    let build_env = vars
        .get(APP_ENV)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| mode.default_env().to_string());

    let active_env = config
        .environment
        .active_env
        .clone()
        .or_else(|| vars.get(APP_ACTIVE_ENV).filter(|v| !v.is_empty()).cloned())
        .unwrap_or_else(|| build_env.clone());

    EnvironmentNames {
        build_env,
        active_env,
    }
}

/// Path of the env file for `active_env` under `site_root`.
pub fn env_file_path(site_root: &Path, active_env: &str) -> PathBuf {
    site_root.join(format!(".env.{}", active_env))
}

/// Whether `path` is one of the site's env files (`.env`, `.env.*`).
pub fn is_env_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == ".env" || n.starts_with(".env."))
        .unwrap_or(false)
}

/// Parse an env file; missing is empty, unreadable is a warning and empty.
pub fn read_env_file(path: &Path) -> BTreeMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return BTreeMap::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "There was a problem processing the env file");
            return BTreeMap::new();
        }
    };

    let mut vars = BTreeMap::new();
    for item in iter {
        match item {
            Ok((k, v)) => {
                vars.insert(k, v);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "There was a problem processing the env file");
                return BTreeMap::new();
            }
        }
    }
    vars
}

/// Snapshot of the live process environment (UTF-8 entries only).
pub fn process_vars() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Merge env-file and process variables and force the reserved keys.
pub fn build_defines(
    file_vars: BTreeMap<String, String>,
    process_vars: &BTreeMap<String, String>,
    names: &EnvironmentNames,
    public_dir: &Path,
) -> BTreeMap<String, String> {
    let mut defines = file_vars;
    defines.extend(process_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    defines.insert(APP_ENV.to_string(), names.build_env.clone());
    defines.insert(PUBLIC_DIR.to_string(), public_dir.display().to_string());
    defines
}

/// Full resolution for one build: names, env file, process env, defines.
pub fn resolve_defines(config: &FnServeConfig, mode: BuildMode) -> BTreeMap<String, String> {
    let vars = process_vars();
    let names = resolve_names(config, mode, &vars);
    let file = env_file_path(&config.site.root, &names.active_env);
    tracing::debug!(build_env = %names.build_env, active_env = %names.active_env, env_file = %file.display(), "Resolved environment");

    build_defines(read_env_file(&file), &vars, &names, &config.public_dir())
}
