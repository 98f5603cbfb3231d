// Cache path utilities.
// Constructs filesystem paths for partitions, entries and the worker state file.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

/// Get the base cache directory (~/.cache/kl-timetable on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "kl-timetable").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to the persisted worker state file.
pub fn state_path(root: &Path) -> PathBuf {
    root.join("state.json")
}

/// Directory holding every partition.
pub fn partitions_dir(root: &Path) -> PathBuf {
    root.join("partitions")
}

/// Directory of a single partition.
pub fn partition_dir(root: &Path, name: &str) -> PathBuf {
    partitions_dir(root).join(sanitize_name(name))
}

/// Path to a partition's metadata file (records the unsanitized name).
pub fn partition_meta_path(root: &Path, name: &str) -> PathBuf {
    partition_dir(root, name).join("partition.json")
}

/// Path to the entry file for a request key.
/// Keys are URLs, so they are hashed rather than sanitized.
pub fn entry_path(root: &Path, name: &str, key: &str) -> PathBuf {
    partition_dir(root, name)
        .join("entries")
        .join(format!("{}.json", entry_file_stem(key)))
}

/// Directory of a partition's entry files.
pub fn entries_dir(root: &Path, name: &str) -> PathBuf {
    partition_dir(root, name).join("entries")
}

fn entry_file_stem(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
