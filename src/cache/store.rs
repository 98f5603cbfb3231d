// File helpers for the on-disk cache.
// JSON envelopes with a cached_at stamp, written atomically via temp file + rename.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(1);

/// Wrapper for data written to disk with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was written.
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// Read a JSON envelope from a file.
pub async fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
    if !fs::try_exists(path).await? {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).await?;
    let cached: CachedData<T> = serde_json::from_str(&contents)?;
    Ok(Some(cached))
}

/// Serialize `data` into a temp file next to `path` without publishing it.
/// Returns the temp path; pass it to [`commit`] to make it visible.
pub async fn stage_cached<T: Serialize>(path: &Path, data: &T) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let cached = CachedData::new(data);
    let json = serde_json::to_string_pretty(&cached)?;

    // Unique per write so concurrent writers to one path never share a temp file.
    let temp_id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("{}.{}.tmp", std::process::id(), temp_id));
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;

    Ok(temp_path)
}

/// Publish a staged temp file at its final path.
pub async fn commit(temp_path: &Path, path: &Path) -> Result<()> {
    fs::rename(temp_path, path).await?;
    Ok(())
}

/// Write data as a JSON envelope atomically.
pub async fn write_cached<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let temp_path = stage_cached(path, data).await?;
    commit(&temp_path, path).await
}

/// Delete a directory and all contents. Returns whether it existed.
pub async fn delete_dir(path: &Path) -> Result<bool> {
    if fs::try_exists(path).await? {
        fs::remove_dir_all(path).await?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[tokio::test]
    async fn test_write_and_read_cached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("test.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_cached(&path, &data).await.unwrap();

        let cached: Option<CachedData<TestData>> = read_cached(&path).await.unwrap();
        let cached = cached.unwrap();
        assert_eq!(cached.data, data);
        assert!(cached.cached_at <= Utc::now());
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_staged_file_is_invisible_until_commit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entry.json");

        let temp = stage_cached(&path, &"pending").await.unwrap();
        let before: Option<CachedData<String>> = read_cached(&path).await.unwrap();
        assert!(before.is_none());

        commit(&temp, &path).await.unwrap();
        let after: Option<CachedData<String>> = read_cached(&path).await.unwrap();
        assert_eq!(after.unwrap().data, "pending");
    }

    #[tokio::test]
    async fn test_read_and_delete_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let cached: Option<CachedData<TestData>> = read_cached(&path).await.unwrap();
        assert!(cached.is_none());
        assert!(!delete_dir(&temp_dir.path().join("missing")).await.unwrap());
    }
}
