//! Directory listing helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns paths to all regular files directly inside `dir`, sorted by path.
///
/// Fails only when the directory itself cannot be read. Entries that vanish or
/// cannot be stat'ed while listing are skipped.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.path())
        .collect();
    files.sort();
    Ok(files)
}
