//! Local asset model and the shared in-memory store.
//!
//! # Module Structure
//!
//! ```text
//! asset/
//! ├── checksum   # Checksum over (key, content)
//! ├── layout     # Directory -> legal extension rules
//! ├── pattern    # Include / ignore glob matching
//! ├── scan       # Initial mount of the project tree
//! └── store      # AssetStore (FileKey -> Arc<Asset>)
//! ```

mod checksum;
mod layout;
mod pattern;
mod scan;
mod store;

use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use checksum::Checksum;
pub use layout::Layout;
pub use pattern::{DEFAULT_IGNORE, PathMatcher};
pub use scan::{MountReport, mount};
pub use store::{AssetStore, ReadOutcome};

// ============================================================================
// FileKey
// ============================================================================

/// `/`-separated path relative to the project root.
///
/// Renames are modelled as delete + add, so a key never changes identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    /// Create a key, normalizing separators and leading `./` or `/`.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into().replace('\\', "/");
        let trimmed = key.trim_start_matches("./").trim_start_matches('/');
        Self(trimmed.to_string())
    }

    /// Derive a key from an absolute path under `root`.
    ///
    /// Returns `None` for paths outside the root or with non UTF-8 segments.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let segments = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// First path segment when the key is nested (`sections` for `sections/a.liquid`).
    pub fn top_dir(&self) -> Option<&str> {
        self.0.split_once('/').map(|(dir, _)| dir)
    }

    /// Ancestor directories from the outermost, e.g. `a`, `a/b` for `a/b/c.json`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.0
            .match_indices('/')
            .map(|(idx, _)| &self.0[..idx])
    }

    /// Absolute path on disk.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }

    #[inline]
    pub fn is_json(&self) -> bool {
        self.extension() == Some("json")
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FileKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Asset
// ============================================================================

/// Asset body: exactly one of text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetContent {
    Text(String),
    Binary(Vec<u8>),
}

impl AssetContent {
    /// Decide the variant from the key's extension, falling back to binary
    /// when a text-typed file is not valid UTF-8.
    pub fn for_key(key: &FileKey, bytes: Vec<u8>) -> Self {
        if !Layout::is_text_key(key) {
            return Self::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    /// Decode a base64 `attachment` as sent by the remote store.
    pub fn from_attachment(encoded: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(encoded.trim()).map(Self::Binary)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Base64 encoding of the body, for binary uploads.
    pub fn to_attachment(&self) -> String {
        BASE64.encode(self.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// One file of the project: key, checksum and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: FileKey,
    pub checksum: Checksum,
    pub content: AssetContent,
}

impl Asset {
    /// Build an asset, computing its checksum.
    pub fn new(key: FileKey, content: AssetContent) -> Self {
        let checksum = Checksum::compute(&key, content.as_bytes());
        Self {
            key,
            checksum,
            content,
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.content, AssetContent::Text(_))
    }
}

// ============================================================================
// AssetError
// ============================================================================

/// Local asset failures (disk io and layout validation).
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read `{}`", .0.display())]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to write `{}`", .0.display())]
    Write(PathBuf, #[source] std::io::Error),

    #[error("`{key}` rejected: {reason}")]
    Invalid { key: FileKey, reason: String },
}

impl AssetError {
    /// True when the file disappeared between the event and the read.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read(_, e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
