//! Last observed remote checksums.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use super::remote::RemoteChecksum;
use crate::asset::{Checksum, FileKey};

/// Immutable FileKey -> checksum map: "what we last observed remotely".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumSnapshot(FxHashMap<FileKey, Checksum>);

impl ChecksumSnapshot {
    pub fn get(&self, key: &str) -> Option<&Checksum> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileKey, &Checksum)> {
        self.0.iter()
    }
}

impl FromIterator<RemoteChecksum> for ChecksumSnapshot {
    fn from_iter<T: IntoIterator<Item = RemoteChecksum>>(iter: T) -> Self {
        Self(iter.into_iter().map(|c| (c.key, c.checksum)).collect())
    }
}

impl FromIterator<(FileKey, Checksum)> for ChecksumSnapshot {
    fn from_iter<T: IntoIterator<Item = (FileKey, Checksum)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Atomically replaceable snapshot slot.
///
/// Readers get a consistent `Arc` even while a cycle swaps in a new one.
#[derive(Debug, Default)]
pub struct SnapshotCell(ArcSwap<ChecksumSnapshot>);

impl SnapshotCell {
    pub fn load(&self) -> Arc<ChecksumSnapshot> {
        self.0.load_full()
    }

    pub fn replace(&self, snapshot: ChecksumSnapshot) {
        self.0.store(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_keeps_old_readers_consistent() {
        let cell = SnapshotCell::default();
        let key = FileKey::new("locales/en.default.json");
        cell.replace(
            [(key.clone(), Checksum::from_hex("c1"))]
                .into_iter()
                .collect(),
        );

        let before = cell.load();
        cell.replace(
            [(key.clone(), Checksum::from_hex("c2"))]
                .into_iter()
                .collect(),
        );

        assert_eq!(before.get(key.as_str()), Some(&Checksum::from_hex("c1")));
        assert_eq!(cell.load().get(key.as_str()), Some(&Checksum::from_hex("c2")));
    }
}
