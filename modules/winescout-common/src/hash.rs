use sha2::{Digest, Sha256};

/// Stable cache key: SHA-256 over sorted `k=v` pairs, truncated to 16 bytes.
/// Sorting makes the key independent of how callers order their parameters.
pub fn cache_key(kind: &str, params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.trim().to_lowercase()))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"\n");
    hasher.update(pairs.join("\n").as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Full SHA-256 hex digest of page content, used to key extraction results.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
