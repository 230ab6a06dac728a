//! On-disk manifest of the function registry.
//!
//! Written after every registry swap for out-of-process consumers
//! (`fnserve serve`, deployment tooling) and read back by them.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::functions::descriptor::FunctionDescriptor;

/// File name of the manifest inside the compiled functions directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors reading or writing the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Serialize the descriptors to `path` as pretty-printed JSON.
///
/// The JSON goes to a sibling temp file that is renamed over `path`, so a
/// concurrent reader sees either the previous manifest or the new one.
pub fn write_manifest(path: &Path, functions: &[FunctionDescriptor]) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = write_to(&tmp, functions).and_then(|()| fs::rename(&tmp, path).map_err(ManifestError::from));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_to(path: &Path, functions: &[FunctionDescriptor]) -> Result<(), ManifestError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, functions)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MANIFEST_FILE.to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Load descriptors previously written by [`write_manifest`].
pub fn load_manifest(path: &Path) -> Result<Vec<FunctionDescriptor>, ManifestError> {
    let file = File::open(path)?;
    let functions = serde_json::from_reader(BufReader::new(file))?;
    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }

    #[test]
    fn test_garbage_manifest_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_manifest(&path).unwrap_err(), ManifestError::Format(_)));
    }

    #[test]
    fn test_pattern_survives_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(MANIFEST_FILE);
        let f = FunctionDescriptor::from_source(Path::new("greet/[name].rs"), dir.path());

        write_manifest(&path, std::slice::from_ref(&f)).unwrap();
        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded[0].match_pattern.as_deref(), Some("greet/:name"));
    }

    #[test]
    fn test_rewrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let functions: Vec<_> = ["a.rs", "b.rs", "c.rs"]
            .iter()
            .map(|s| FunctionDescriptor::from_source(Path::new(s), dir.path()))
            .collect();

        write_manifest(&path, &functions).unwrap();
        write_manifest(&path, &functions[..1]).unwrap();

        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].route, "a");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != MANIFEST_FILE)
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn test_temp_file_is_hidden_sibling() {
        let tmp = temp_path(Path::new("/out/functions/manifest.json"));
        assert_eq!(tmp, Path::new("/out/functions/.manifest.json.tmp"));
    }
}
