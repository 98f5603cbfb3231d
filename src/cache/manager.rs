// Cache manager.
// Owns the versioned static/dynamic partition pair and their lifecycle.

use std::sync::Arc;

use url::Url;

use crate::error::{Result, WorkerError};
use crate::http::{Network, Request, Response};

use super::storage::{CacheStorage, Partition};

pub const DEFAULT_CACHE_PREFIX: &str = "kl-timetable";
pub const DEFAULT_CACHE_VERSION: &str = "v7";

/// Version pair naming the current static and dynamic partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
    prefix: String,
    version: String,
}

impl CacheVersion {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// e.g. `kl-timetable-static-v7`
    pub fn static_name(&self) -> String {
        format!("{}-static-{}", self.prefix, self.version)
    }

    /// e.g. `kl-timetable-dynamic-v7`
    pub fn dynamic_name(&self) -> String {
        format!("{}-dynamic-{}", self.prefix, self.version)
    }

    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name() || name == self.dynamic_name()
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION)
    }
}

pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
    version: CacheVersion,
}

impl CacheManager {
    pub fn new(storage: Arc<dyn CacheStorage>, version: CacheVersion) -> Self {
        Self { storage, version }
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Open (creating if needed) a partition by name.
    pub async fn open(&self, name: &str) -> Result<Partition> {
        self.storage.open(name).await?;
        Ok(Partition::new(name, Arc::clone(&self.storage)))
    }

    pub async fn static_partition(&self) -> Result<Partition> {
        self.open(&self.version.static_name()).await
    }

    pub async fn dynamic_partition(&self) -> Result<Partition> {
        self.open(&self.version.dynamic_name()).await
    }

    /// Fetch every URL and store them all, or store nothing.
    ///
    /// Fails on the first URL that is unreachable or answers non-2xx.
    pub async fn add_all(
        &self,
        partition: &Partition,
        urls: &[Url],
        network: &dyn Network,
    ) -> Result<usize> {
        let mut fetched = Vec::with_capacity(urls.len());

        for url in urls {
            let request = Request::from_url(url.clone());
            let response = network
                .fetch(&request)
                .await
                .map_err(|e| WorkerError::InstallFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            if !response.ok() {
                return Err(WorkerError::InstallFailed {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            fetched.push((request, response));
        }

        let count = fetched.len();
        partition.put_all(fetched).await?;
        tracing::debug!(partition = partition.name(), count, "stored manifest entries");
        Ok(count)
    }

    /// Search every partition for a stored response.
    ///
    /// The current static and dynamic partitions are searched first, then
    /// any other partition still present.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        let current = [self.version.static_name(), self.version.dynamic_name()];
        let others: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| !self.version.is_current(name))
            .collect();

        let key = request.cache_key();
        for name in current.iter().chain(others.iter()) {
            if let Some(entry) = self.storage.get(name, &key).await? {
                return Ok(Some(entry.into_response()));
            }
        }
        Ok(None)
    }

    /// Permanently remove a partition. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        self.storage.delete(name).await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.storage.keys().await
    }

    /// Delete every partition not named by the current version pair.
    pub async fn evict_stale(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if self.version.is_current(&name) {
                continue;
            }
            tracing::info!(partition = %name, "deleting old cache");
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}
