//! Cheap content hashing using FxHash.
//!
//! Not cryptographic: only used to recognize a repeated broadcast. File
//! checksums live in `asset::Checksum`.
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let h = hash::compute(r#"{"event":"update"}"#); // -> u64
//! ```

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_deterministic() {
        assert_eq!(compute("same"), compute(b"same"));
        assert_ne!(compute("one"), compute("two"));
    }
}
