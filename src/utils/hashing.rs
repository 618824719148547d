//! Stable content digests

use sha2::{Digest, Sha256};

/// First 16 hex chars of the SHA-256 of `content`.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}
