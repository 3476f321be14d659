//! Deterministic directory walking.

use std::path::{Path, PathBuf};

/// Whether `path` ends in `ext`, compared case-insensitively.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Recursively collect files under `dir` matching `filter`, sorted by path.
///
/// A missing directory yields an empty list. Unreadable subdirectories are
/// skipped with a warning.
pub fn collect_files<F>(dir: &Path, filter: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    walk(dir, &filter, &mut files);
    files.sort();
    files
}

fn walk<F>(dir: &Path, filter: &F, out: &mut Vec<PathBuf>)
where
    F: Fn(&Path) -> bool,
{
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if dir.exists() {
                tracing::warn!("Cannot read directory {}: {}", dir.display(), e);
            }
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, filter, out);
        } else if filter(&path) {
            out.push(path);
        }
    }
}
