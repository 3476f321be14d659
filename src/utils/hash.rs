//! Content fingerprints and file checksums.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

use crate::config::HashAlgorithm;

/// Hash `text` with the configured algorithm, as lowercase hex.
///
/// xxHash64 yields 16 hex characters, SHA-256 yields 64.
pub fn compute_hash(text: &str, algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Xxhash64 => format!("{:016x}", xxh64(text.as_bytes(), 0)),
        HashAlgorithm::Sha256 => sha256_hex(text.as_bytes()),
    }
}

/// Compute SHA-256 hash of content.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's bytes, streamed in 8 KiB chunks.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
