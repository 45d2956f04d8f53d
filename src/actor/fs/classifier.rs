use std::path::{Path, PathBuf};
use std::sync::Arc;

use jwalk::WalkDir;

use super::types::ChangeKind;
use crate::actor::messages::{ChangeEvent, ChangeType};
use crate::asset::{AssetStore, FileKey, PathMatcher};
use crate::utils::path::normalize_path;

/// Turns settled paths into store-consistent `ChangeEvent`s.
///
/// Pipeline: correct_by_existence → expand_directories → to_keys → apply
pub(super) struct EventClassifier<'a> {
    pub(super) store: &'a AssetStore,
    pub(super) matcher: &'a PathMatcher,
}

impl EventClassifier<'_> {
    pub(super) fn classify(&self, ready: Vec<(PathBuf, ChangeKind)>) -> Vec<ChangeEvent> {
        let mut changes = ready;

        Self::correct_by_existence(&mut changes);
        self.expand_directories(&mut changes);

        let mut events = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        for (path, kind) in changes {
            let Some(key) = self.to_key(&path) else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            if !self.matcher.is_match(&key) {
                crate::debug!("watch"; "filtered: {}", key);
                continue;
            }
            if let Some(event) = self.apply(key, kind) {
                events.push(event);
            }
        }
        events
    }

    /// Reconcile event kinds with the actual filesystem state.
    ///
    /// Atomic saves report Removed for a file that exists again, renames
    /// report Modified for a path that is gone.
    fn correct_by_existence(changes: &mut [(PathBuf, ChangeKind)]) {
        for (path, kind) in changes.iter_mut() {
            let exists = path.exists();
            match kind {
                ChangeKind::Created | ChangeKind::Modified if !exists => {
                    crate::debug!("watch"; "upgrade {}->removed: {}", kind.label(), path.display());
                    *kind = ChangeKind::Removed;
                }
                ChangeKind::Removed if exists => {
                    crate::debug!("watch"; "downgrade removed->modified: {}", path.display());
                    *kind = ChangeKind::Modified;
                }
                _ => {}
            }
        }
    }

    /// Replace directory events with file events.
    ///
    /// - Removed directory → every tracked key below it
    /// - Created / modified directory → every file below it
    fn expand_directories(&self, changes: &mut Vec<(PathBuf, ChangeKind)>) {
        let mut expanded = Vec::with_capacity(changes.len());

        for (path, kind) in changes.drain(..) {
            match kind {
                ChangeKind::Removed => {
                    let tracked = self
                        .to_key(&path)
                        .is_some_and(|key| self.store.contains(key.as_str()));
                    if tracked {
                        expanded.push((path, kind));
                        continue;
                    }
                    expanded.extend(self.tracked_under(&path).map(|p| (p, ChangeKind::Removed)));
                }
                _ if path.is_dir() => {
                    expanded.extend(files_under(&path).map(|p| (p, ChangeKind::Created)));
                }
                _ => expanded.push((path, kind)),
            }
        }

        *changes = expanded;
    }

    fn tracked_under<'s>(&'s self, dir: &Path) -> impl Iterator<Item = PathBuf> + 's {
        let prefix = self.to_key(dir).map(|key| format!("{key}/"));
        let root = self.store.root();
        self.store
            .keys()
            .into_iter()
            .filter(move |key| prefix.as_deref().is_some_and(|p| key.as_str().starts_with(p)))
            .map(move |key| key.to_path(root))
    }

    fn to_key(&self, path: &Path) -> Option<FileKey> {
        let root = self.store.root();
        FileKey::from_path(root, path).or_else(|| FileKey::from_path(root, &normalize_path(path)))
    }

    /// Update the store for one key and build the event listeners will see.
    fn apply(&self, key: FileKey, kind: ChangeKind) -> Option<ChangeEvent> {
        if kind == ChangeKind::Removed {
            return self.unlink(key);
        }

        let existed = self.store.contains(key.as_str());
        match self.store.read(&key) {
            Ok(outcome) if !outcome.changed => {
                crate::debug!("watch"; "unchanged: {}", key);
                None
            }
            Ok(outcome) => {
                self.store.mark_override(&key);
                Some(ChangeEvent {
                    kind: if existed { ChangeType::Change } else { ChangeType::Add },
                    key,
                    asset: Some(Arc::clone(&outcome.asset)),
                })
            }
            Err(e) if e.is_not_found() => self.unlink(key),
            Err(e) => {
                crate::logger::status_error(&format!("rejected {key}"), &e.to_string());
                None
            }
        }
    }

    fn unlink(&self, key: FileKey) -> Option<ChangeEvent> {
        self.store.remove(key.as_str())?;
        Some(ChangeEvent::unlink(key))
    }
}

pub(super) fn files_under(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
}
