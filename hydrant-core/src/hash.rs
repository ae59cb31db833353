//! Content hashing helpers shared across the workspace.
//!
//! Everything that needs a digest (source snapshots, template set versions,
//! artifact fingerprints, synthetic commit ids) goes through these two
//! functions so the encoding is uniform: SHA-256, lowercase hex.

use sha2::{Digest, Sha256};

/// Hash a byte slice and return the lowercase hex digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a sequence of labelled byte chunks.
///
/// Each part is fed as `len(label) || label || len(bytes) || bytes` so that
/// chunk boundaries cannot be confused. Callers must present parts in a
/// deterministic order.
pub fn sha256_hex_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut hasher = Sha256::new();
    for (label, bytes) in parts {
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label.as_bytes());
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// First eight hex characters of a digest, for log lines and run ids.
pub fn short(digest: &str) -> &str {
    if digest.len() >= 8 {
        &digest[..8]
    } else {
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        let a = sha256_hex(b"hello");
        let b = sha256_hex(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn parts_are_boundary_safe() {
        let joined = sha256_hex_parts(vec![("ab", b"c".as_slice())]);
        let split = sha256_hex_parts(vec![("a", b"bc".as_slice())]);
        assert_ne!(joined, split);
    }

    #[test]
    fn short_truncates() {
        let digest = sha256_hex(b"x");
        assert_eq!(short(&digest).len(), 8);
        assert_eq!(short("abc"), "abc");
    }
}
