//! Asset checksums.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::FileKey;

/// Hex-encoded blake3 digest over `key || 0x00 || content`.
///
/// Folding the key in means identical bodies under different keys never
/// compare equal. Remote checksums are carried in the same type, so they
/// must use the same scheme to be comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn compute(key: &FileKey, content: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(key.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(content);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    /// Wrap a checksum reported by a remote endpoint.
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into().to_ascii_lowercase())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for log lines
        let end = self.0.len().min(12);
        f.write_str(&self.0[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let key = FileKey::new("locales/en.default.json");
        let a = Checksum::compute(&key, b"{\"a\":1}");
        let b = Checksum::compute(&key, b"{\"a\":1}");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let key = FileKey::new("locales/en.default.json");
        assert_ne!(
            Checksum::compute(&key, b"{\"a\":1}"),
            Checksum::compute(&key, b"{\"a\":2}")
        );
    }

    #[test]
    fn test_checksum_key_boundary() {
        // "ab" + "c" must not collide with "a" + "bc"
        let left = Checksum::compute(&FileKey::new("ab"), b"c");
        let right = Checksum::compute(&FileKey::new("a"), b"bc");
        assert_ne!(left, right);
    }

    #[test]
    fn test_from_hex_is_case_insensitive() {
        let key = FileKey::new("a.json");
        let local = Checksum::compute(&key, b"x");
        let remote = Checksum::from_hex(local.as_str().to_uppercase());
        assert_eq!(local, remote);
    }

    #[test]
    fn test_display_is_short() {
        let sum = Checksum::compute(&FileKey::new("a.json"), b"x");
        assert_eq!(sum.to_string().len(), 12);
    }
}
