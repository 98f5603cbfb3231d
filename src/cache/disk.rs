// On-disk cache storage.
// One directory per partition, one JSON file per entry, all writes atomic.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;

use super::paths;
use super::storage::{CacheStorage, StoredResponse};
use super::store::{self, CachedData};

/// Metadata file kept in each partition directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionMeta {
    name: String,
}

/// Entry file contents: the request key alongside the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    response: StoredResponse,
}

#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_meta(&self, dir: &Path) -> Result<Option<CachedData<PartitionMeta>>> {
        store::read_cached(&dir.join("partition.json")).await
    }
}

/// List `*.json` files in a directory, ignoring in-flight temp files.
async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !fs::try_exists(dir).await? {
        return Ok(files);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(files)
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let dir = paths::partitions_dir(&self.root);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match self.read_meta(&entry.path()).await? {
                Some(meta) => found.push((meta.cached_at, meta.data.name)),
                None => tracing::warn!(path = %entry.path().display(), "partition without metadata"),
            }
        }

        // Creation order, like the browser's CacheStorage.keys().
        found.sort();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(fs::try_exists(paths::partition_meta_path(&self.root, name)).await?)
    }

    async fn open(&self, name: &str) -> Result<()> {
        let meta_path = paths::partition_meta_path(&self.root, name);
        if !fs::try_exists(&meta_path).await? {
            let meta = PartitionMeta {
                name: name.to_string(),
            };
            store::write_cached(&meta_path, &meta).await?;
            tracing::debug!(partition = name, "created partition");
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        store::delete_dir(&paths::partition_dir(&self.root, name)).await
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<StoredResponse>> {
        let path = paths::entry_path(&self.root, name, key);
        let entry: Option<CachedData<DiskEntry>> = store::read_cached(&path).await?;
        // A hash collision would surface as a different key; treat it as a miss.
        Ok(entry
            .map(|cached| cached.data)
            .filter(|entry| entry.key == key)
            .map(|entry| entry.response))
    }

    async fn put(&self, name: &str, key: &str, entry: StoredResponse) -> Result<()> {
        self.open(name).await?;
        let path = paths::entry_path(&self.root, name, key);
        let entry = DiskEntry {
            key: key.to_string(),
            response: entry,
        };
        store::write_cached(&path, &entry).await
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, StoredResponse)>) -> Result<()> {
        self.open(name).await?;

        // Stage every entry before publishing any of them.
        let mut staged = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            let path = paths::entry_path(&self.root, name, &key);
            let entry = DiskEntry { key, response };
            match store::stage_cached(&path, &entry).await {
                Ok(temp) => staged.push((temp, path)),
                Err(e) => {
                    for (temp, _) in &staged {
                        let _ = fs::remove_file(temp).await;
                    }
                    return Err(e);
                }
            }
        }

        // Unpublish on a failed rename so no partial set stays visible.
        for (i, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = store::commit(temp, path).await {
                for (_, committed) in &staged[..i] {
                    let _ = fs::remove_file(committed).await;
                }
                for (pending, _) in &staged[i..] {
                    let _ = fs::remove_file(pending).await;
                }
                tracing::warn!(partition = name, error = %e, "put_all rolled back");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for path in json_files(&paths::entries_dir(&self.root, name)).await? {
            let entry: Option<CachedData<DiskEntry>> = store::read_cached(&path).await?;
            if let Some(entry) = entry {
                keys.push(entry.data.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use tempfile::TempDir;

    fn entry(body: &str) -> StoredResponse {
        StoredResponse::from_response(Response::new(200).with_body(body)).unwrap()
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let storage = DiskStorage::new(temp_dir.path());
        storage
            .put("kl-timetable-dynamic-v7", "https://kl.example/app.js", entry("js"))
            .await
            .unwrap();
        drop(storage);

        let reopened = DiskStorage::new(temp_dir.path());
        assert_eq!(reopened.keys().await.unwrap(), vec!["kl-timetable-dynamic-v7"]);
        let got = reopened
            .get("kl-timetable-dynamic-v7", "https://kl.example/app.js")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.body, b"js");
    }

    #[tokio::test]
    async fn test_put_all_and_entry_keys() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(temp_dir.path());

        let entries = vec![
            ("https://kl.example/".to_string(), entry("root")),
            ("https://kl.example/index.html".to_string(), entry("index")),
            ("https://kl.example/manifest.json".to_string(), entry("{}")),
        ];
        storage.put_all("static", entries).await.unwrap();

        let keys = storage.entry_keys("static").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "https://kl.example/",
                "https://kl.example/index.html",
                "https://kl.example/manifest.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_put_all_failed_commit_leaves_nothing_visible() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(temp_dir.path());

        // A directory squatting on the last entry's path makes its rename fail.
        let blocked =
            paths::entry_path(temp_dir.path(), "static", "https://kl.example/manifest.json");
        std::fs::create_dir_all(&blocked).unwrap();

        let entries = vec![
            ("https://kl.example/".to_string(), entry("root")),
            ("https://kl.example/index.html".to_string(), entry("index")),
            ("https://kl.example/manifest.json".to_string(), entry("{}")),
        ];
        assert!(storage.put_all("static", entries).await.is_err());

        for key in ["https://kl.example/", "https://kl.example/index.html"] {
            assert!(storage.get("static", key).await.unwrap().is_none(), "{}", key);
        }
        let leftovers: Vec<_> = std::fs::read_dir(paths::entries_dir(temp_dir.path(), "static"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(leftovers, vec![blocked]);
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(temp_dir.path());

        storage.open("old-v6").await.unwrap();
        storage.open("new-v7").await.unwrap();
        assert!(storage.has("old-v6").await.unwrap());

        assert!(storage.delete("old-v6").await.unwrap());
        assert!(!storage.has("old-v6").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["new-v7"]);
        assert!(storage.entry_keys("old-v6").await.unwrap().is_empty());
    }
}
