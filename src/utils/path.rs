//! Absolute forms of the config file, the project root and watcher paths.

use std::path::{Path, PathBuf};

/// Absolute form of `path`, with symlinks resolved when it exists.
///
/// Watchers may report paths through a symlinked root; the canonical form
/// strips cleanly against the canonical project root.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}

/// Resolve `--root`: taken as given when absolute or present under the cwd,
/// otherwise relative to the directory holding the config file.
pub fn resolve_root(root: &Path, config_dir: &Path) -> PathBuf {
    if root.is_absolute() || root.exists() {
        normalize_path(root)
    } else {
        normalize_path(&config_dir.join(root))
    }
}
