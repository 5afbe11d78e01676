//! Signatures and cache keys for persisted KNN tables.

use crate::types::ID_SEPARATOR;
use sha2::{Digest, Sha256};

/// Hex characters of the SHA-256 digest kept in a signature.
const SIGNATURE_HASH_LEN: usize = 16;

/// Fingerprint of an ordered id sequence and a vector dimensionality.
///
/// Stable across runs and platforms; changes when any id is added, removed or
/// moved, or when `dim` changes.
pub fn signature(ids: &[String], dim: usize) -> String {
    let mut hasher = Sha256::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(ID_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(id.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}:{}", &digest[..SIGNATURE_HASH_LEN], dim)
}

/// Store key of a KNN table: `prefix:k:signature`.
pub fn cache_key(prefix: &str, k: usize, signature: &str) -> String {
    format!("{}:{}:{}", prefix, k, signature)
}
