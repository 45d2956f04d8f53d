//! Initial mount: load the project tree into the store before watching.

use jwalk::WalkDir;

use super::{AssetError, AssetStore, FileKey, PathMatcher};

/// What the initial mount found.
#[derive(Debug, Default)]
pub struct MountReport {
    pub loaded: usize,
    /// Files present on disk that the layout rejected or that failed to read.
    pub rejected: Vec<AssetError>,
}

/// Walk every layout directory under the store root and load matching files.
pub fn mount(store: &AssetStore, matcher: &PathMatcher) -> MountReport {
    let root = store.root().to_path_buf();
    let mut report = MountReport::default();

    for dir_path in store.layout().roots(&root) {
        if !dir_path.is_dir() {
            continue;
        }

        let files = WalkDir::new(&dir_path)
            .sort(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path());

        for path in files {
            let Some(key) = FileKey::from_path(&root, &path) else {
                continue;
            };
            if !matcher.is_match(&key) {
                continue;
            }
            match store.read(&key) {
                Ok(_) => report.loaded += 1,
                Err(e) => report.rejected.push(e),
            }
        }
    }

    crate::debug!("watch"; "mounted {} files ({} rejected)", report.loaded, report.rejected.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Layout;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_mount_loads_legal_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "locales/en.default.json", "{\"a\":1}");
        write(root, "sections/header.liquid", "<header>");
        write(root, "assets/img/logo.png", "png");
        write(root, "README.md", "ignored, not in a project dir");

        let store = AssetStore::new(root, Layout::Theme);
        let report = mount(&store, &PathMatcher::default());

        assert_eq!(report.loaded, 3);
        assert!(report.rejected.is_empty());
        assert!(store.contains("assets/img/logo.png"));
        assert!(!store.contains("README.md"));
    }

    #[test]
    fn test_mount_skips_ignored_and_reports_invalid() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "assets/node_modules/lib.js", "x");
        write(root, "snippets/.card.liquid.swp", "x");
        write(root, "blocks/hero.json", "{}");
        write(root, "blocks/hero.liquid", "{% schema %}{% endschema %}");

        let store = AssetStore::new(root, Layout::Theme);
        let matcher = PathMatcher::default().with_default_ignores();
        let report = mount(&store, &matcher);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(store.keys(), vec![FileKey::new("blocks/hero.liquid")]);
    }
}
