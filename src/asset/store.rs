//! Shared in-memory asset store.
//!
//! There is no store-wide lock: every key maps to an `Arc<Asset>` that is
//! replaced atomically, so readers never observe a half-written asset.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use rustc_hash::FxHashMap;

use super::{Asset, AssetContent, AssetError, Checksum, FileKey, Layout};

/// Result of loading a file from disk into the store.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub asset: Arc<Asset>,
    /// False when the stored checksum already matched the disk content.
    pub changed: bool,
}

/// FileKey -> Asset map for one project root.
#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    layout: Layout,
    files: DashMap<FileKey, Arc<Asset>>,
    /// Keys changed locally and not yet seen equal on the remote.
    overrides: DashSet<FileKey>,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
            files: DashMap::new(),
            overrides: DashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, key: &str) -> Option<Arc<Asset>> {
        self.files.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn checksum(&self, key: &str) -> Option<Checksum> {
        self.files.get(key).map(|entry| entry.checksum.clone())
    }

    /// Point-in-time copy of every key's checksum.
    pub fn checksums(&self) -> FxHashMap<FileKey, Checksum> {
        self.files
            .iter()
            .map(|entry| (entry.key().clone(), entry.checksum.clone()))
            .collect()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<FileKey> {
        let mut keys: Vec<_> = self.files.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    // ========================================================================
    // In-memory mutation
    // ========================================================================

    /// Insert an asset without touching disk. Returns the previous value.
    pub fn insert(&self, asset: Asset) -> Result<Option<Arc<Asset>>, AssetError> {
        self.layout.validate(&asset.key)?;
        Ok(self.files.insert(asset.key.clone(), Arc::new(asset)))
    }

    /// Drop a key from memory only.
    pub fn remove(&self, key: &str) -> Option<Arc<Asset>> {
        self.overrides.remove(key);
        self.files.remove(key).map(|(_, asset)| asset)
    }

    // ========================================================================
    // Disk-backed operations
    // ========================================================================

    /// Load `key` from disk, updating the store when the checksum differs.
    pub fn read(&self, key: &FileKey) -> Result<ReadOutcome, AssetError> {
        self.layout.validate(key)?;

        let path = key.to_path(&self.root);
        let bytes = fs::read(&path).map_err(|e| AssetError::Read(path, e))?;
        let asset = Asset::new(key.clone(), AssetContent::for_key(key, bytes));

        if let Some(existing) = self.get(key.as_str())
            && existing.checksum == asset.checksum
        {
            return Ok(ReadOutcome {
                asset: existing,
                changed: false,
            });
        }

        let asset = Arc::new(asset);
        self.files.insert(key.clone(), Arc::clone(&asset));
        Ok(ReadOutcome {
            asset,
            changed: true,
        })
    }

    /// Persist an asset to disk and the store.
    pub fn write(&self, asset: Asset) -> Result<Arc<Asset>, AssetError> {
        self.layout.validate(&asset.key)?;

        let path = asset.key.to_path(&self.root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::Write(parent.to_path_buf(), e))?;
        }
        fs::write(&path, asset.content.as_bytes()).map_err(|e| AssetError::Write(path, e))?;

        let asset = Arc::new(asset);
        self.files.insert(asset.key.clone(), Arc::clone(&asset));
        Ok(asset)
    }

    /// Remove a key from disk and the store. A file already gone is not an error.
    pub fn delete(&self, key: &FileKey) -> Result<Option<Arc<Asset>>, AssetError> {
        let path = key.to_path(&self.root);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AssetError::Write(path, e)),
        }
        Ok(self.remove(key.as_str()))
    }

    // ========================================================================
    // Local overrides
    // ========================================================================

    pub fn mark_override(&self, key: &FileKey) {
        self.overrides.insert(key.clone());
    }

    pub fn clear_override(&self, key: &str) -> bool {
        self.overrides.remove(key).is_some()
    }

    pub fn is_override(&self, key: &str) -> bool {
        self.overrides.contains(key)
    }

    /// Override assets currently present in the store, sorted by key.
    pub fn overrides(&self) -> Vec<Arc<Asset>> {
        let mut assets: Vec<_> = self
            .overrides
            .iter()
            .filter_map(|key| self.get(key.as_str()))
            .collect();
        assets.sort_by(|a, b| a.key.cmp(&b.key));
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, AssetStore) {
        let temp = TempDir::new().unwrap();
        let store = AssetStore::new(temp.path(), Layout::Theme);
        (temp, store)
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (_temp, store) = store();
        let key = FileKey::new("locales/en.default.json");
        let body = AssetContent::Text("{\"a\":1}".into());

        let written = store.write(Asset::new(key.clone(), body.clone())).unwrap();
        assert_eq!(written.checksum, Checksum::compute(&key, body.as_bytes()));

        store.remove(key.as_str());
        let outcome = store.read(&key).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.asset.content, body);
        assert_eq!(outcome.asset.checksum, written.checksum);
    }

    #[test]
    fn test_read_unchanged_reports_no_change() {
        let (temp, store) = store();
        let key = FileKey::new("snippets/card.liquid");
        std::fs::create_dir_all(temp.path().join("snippets")).unwrap();
        std::fs::write(temp.path().join("snippets/card.liquid"), "<div>").unwrap();

        assert!(store.read(&key).unwrap().changed);
        assert!(!store.read(&key).unwrap().changed);

        std::fs::write(temp.path().join("snippets/card.liquid"), "<section>").unwrap();
        assert!(store.read(&key).unwrap().changed);
    }

    #[test]
    fn test_read_missing_file() {
        let (_temp, store) = store();
        let err = store.read(&FileKey::new("sections/gone.liquid")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_layout_violation_rejected() {
        let (temp, store) = store();
        std::fs::create_dir_all(temp.path().join("blocks")).unwrap();
        std::fs::write(temp.path().join("blocks/hero.json"), "{}").unwrap();

        let err = store.read(&FileKey::new("blocks/hero.json")).unwrap_err();
        assert!(matches!(err, AssetError::Invalid { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_tolerates_missing_file() {
        let (_temp, store) = store();
        let key = FileKey::new("config/settings_data.json");
        store.insert(Asset::new(key.clone(), AssetContent::Text("{}".into()))).unwrap();
        store.mark_override(&key);

        let removed = store.delete(&key).unwrap();
        assert!(removed.is_some());
        assert!(!store.contains(key.as_str()));
        assert!(!store.is_override(key.as_str()));
    }

    #[test]
    fn test_overrides_sorted_and_present_only() {
        let (_temp, store) = store();
        for k in ["templates/index.json", "assets/app.css"] {
            let key = FileKey::new(k);
            store.insert(Asset::new(key.clone(), AssetContent::Text("x".into()))).unwrap();
            store.mark_override(&key);
        }
        store.mark_override(&FileKey::new("sections/never-loaded.liquid"));

        let keys: Vec<_> = store.overrides().iter().map(|a| a.key.to_string()).collect();
        assert_eq!(keys, vec!["assets/app.css", "templates/index.json"]);

        assert!(store.clear_override("assets/app.css"));
        assert!(!store.clear_override("assets/app.css"));
    }
}
