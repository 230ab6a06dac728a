//! Source file discovery.

use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options controlling which files count as function sources.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Accepted extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Directory names skipped entirely (dependency trees, build output).
    pub ignored_dirs: Vec<String>,
}

/// Enumerate source files under `root`, relative to it, sorted by path.
///
/// Hidden entries and `ignored_dirs` are pruned. A missing root yields an
/// empty list. Entries below the root that cannot be read (broken symlinks,
/// permission errors) are skipped with a warning; only an unreadable root
/// is an error.
pub fn discover_sources(root: &Path, options: &DiscoveryOptions) -> Result<Vec<PathBuf>, walkdir::Error> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_pruned(e, options));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                if !e.path().map(|p| is_excluded(p.strip_prefix(root).unwrap_or(p), options)).unwrap_or(false) {
                    tracing::warn!(error = %e, "Skipping unreadable entry in functions directory");
                }
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), &options.extensions) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }

    // Pattern precedence depends on this order.
    files.sort();
    Ok(files)
}

/// Whether `path` carries one of the accepted source extensions.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x == e))
        .unwrap_or(false)
}

/// Whether a path relative to the functions root lies in a hidden entry or
/// an ignored directory.
pub fn is_excluded(relative: &Path, options: &DiscoveryOptions) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || options.ignored_dirs.iter().any(|d| *d == name)
        }
        _ => false,
    })
}

fn is_pruned(entry: &DirEntry, options: &DiscoveryOptions) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && options.ignored_dirs.iter().any(|d| *d == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn options() -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: vec!["ts".into(), "rs".into()],
            ignored_dirs: vec!["node_modules".into()],
        }
    }

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "").unwrap();
    }

    #[test]
    fn test_discovers_sorted_sources() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "zeta.ts");
        touch(dir.path(), "greet/[name].ts");
        touch(dir.path(), "alpha.rs");
        touch(dir.path(), "README.md");

        let files = discover_sources(dir.path(), &options()).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("alpha.rs"),
                PathBuf::from("greet/[name].ts"),
                PathBuf::from("zeta.ts"),
            ]
        );
    }

    #[test]
    fn test_skips_hidden_and_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "node_modules/pkg/index.ts");
        touch(dir.path(), ".git/hooks/x.ts");
        touch(dir.path(), ".hidden.ts");
        touch(dir.path(), "ok.ts");

        let files = discover_sources(dir.path(), &options()).unwrap();
        assert_eq!(files, vec![PathBuf::from("ok.ts")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "hello.rs");
        // Editor lock files are symlinks to nowhere.
        std::os::unix::fs::symlink("user@host.1234", dir.path().join(".#hello.rs")).unwrap();
        std::os::unix::fs::symlink("missing.rs", dir.path().join("broken.rs")).unwrap();

        let files = discover_sources(dir.path(), &options()).unwrap();
        assert_eq!(files, vec![PathBuf::from("hello.rs")]);
    }

    #[test]
    fn test_is_excluded() {
        let opts = options();
        assert!(is_excluded(Path::new(".hello.rs.swp"), &opts));
        assert!(is_excluded(Path::new("users/.#id.rs"), &opts));
        assert!(is_excluded(Path::new("node_modules/pkg/index.ts"), &opts));
        assert!(!is_excluded(Path::new("users/[id].rs"), &opts));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = discover_sources(&dir.path().join("absent"), &options()).unwrap();
        assert!(files.is_empty());
    }
}
