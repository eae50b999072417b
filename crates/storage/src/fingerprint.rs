use sha2::{Digest, Sha256};

/// Dedup key of an item: SHA-256 hex over the plaintext url and content,
/// NUL-separated so `("ab", "c")` and `("a", "bc")` differ.
pub fn fingerprint(url: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
