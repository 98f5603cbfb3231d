// In-memory cache storage.
// Keeps partitions in creation order; used by tests and short-lived runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

use super::storage::{CacheStorage, StoredResponse};

type Entries = BTreeMap<String, StoredResponse>;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    partitions: RwLock<Vec<(String, Entries)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find<'a>(partitions: &'a [(String, Entries)], name: &str) -> Option<&'a Entries> {
    partitions.iter().find(|(n, _)| n == name).map(|(_, e)| e)
}

fn find_or_create<'a>(partitions: &'a mut Vec<(String, Entries)>, name: &str) -> &'a mut Entries {
    let index = match partitions.iter().position(|(n, _)| n == name) {
        Some(index) => index,
        None => {
            partitions.push((name.to_string(), Entries::new()));
            partitions.len() - 1
        }
    };
    &mut partitions[index].1
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let partitions = self.partitions.read().await;
        Ok(find(&partitions, name).is_some())
    }

    async fn open(&self, name: &str) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        Ok(partitions.len() != before)
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<StoredResponse>> {
        let partitions = self.partitions.read().await;
        Ok(find(&partitions, name).and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, name: &str, key: &str, entry: StoredResponse) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name).insert(key.to_string(), entry);
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, StoredResponse)>) -> Result<()> {
        // Single write lock: readers see all of the entries or none.
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name).extend(entries);
        Ok(())
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(find(&partitions, name)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    fn entry(body: &str) -> StoredResponse {
        StoredResponse::from_response(Response::new(200).with_body(body)).unwrap()
    }

    #[tokio::test]
    async fn test_keys_keep_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("b-static").await.unwrap();
        storage.open("a-dynamic").await.unwrap();
        storage.open("b-static").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["b-static", "a-dynamic"]);
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = MemoryStorage::new();
        storage.put("p", "https://kl.example/", entry("home")).await.unwrap();

        assert!(storage.has("p").await.unwrap());
        let got = storage.get("p", "https://kl.example/").await.unwrap().unwrap();
        assert_eq!(got.body, b"home");
        assert!(storage.get("p", "https://kl.example/x").await.unwrap().is_none());

        assert!(storage.delete("p").await.unwrap());
        assert!(!storage.delete("p").await.unwrap());
        assert!(storage.get("p", "https://kl.example/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let storage = MemoryStorage::new();
        storage.put("p", "k", entry("first")).await.unwrap();
        storage.put("p", "k", entry("second")).await.unwrap();

        assert_eq!(storage.get("p", "k").await.unwrap().unwrap().body, b"second");
        assert_eq!(storage.entry_keys("p").await.unwrap().len(), 1);
    }
}
