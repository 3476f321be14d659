//! Shared utility functions.
//!
//! - `hash`: content fingerprints and file checksums
//! - `fs`: deterministic directory walking

mod fs;
mod hash;

pub use fs::{collect_files, has_extension};
pub use hash::{compute_hash, sha256_file, sha256_hex};
