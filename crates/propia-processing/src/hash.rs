//! Content digest for deduplication.
//!
//! The digest is computed over the **normalized** bytes, not the original
//! upload, so two different source files that normalize identically dedupe
//! to one stored object.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `data`.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            content_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_stable() {
        let a = content_digest(b"listing photo bytes");
        let b = content_digest(b"listing photo bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_digest(b"different bytes"));
    }
}
