// Cache storage seam.
// Named partitions of request-keyed responses, plus the partition handle used by strategies.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::{Request, Response, ResponseSource};

/// A response as persisted in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(with = "hex_body")]
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Take ownership of a response's body. Pass a clone when the
    /// original still has to be delivered.
    pub fn from_response(mut response: Response) -> Result<Self> {
        let body = response.bytes()?;
        Ok(Self {
            url: response.url,
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body,
            cached_at: Utc::now(),
        })
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.status)
            .with_url(self.url)
            .with_status_text(self.status_text)
            .with_source(ResponseSource::Cache)
            .with_body(self.body);
        response.headers = self.headers;
        response
    }
}

mod hex_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Backing store for named cache partitions.
///
/// Every mutation must be durable by the time the future resolves.
/// `put_all` either writes every entry or none of them.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all partitions.
    async fn keys(&self) -> Result<Vec<String>>;

    async fn has(&self, name: &str) -> Result<bool>;

    /// Create the partition if it does not exist.
    async fn open(&self, name: &str) -> Result<()>;

    /// Remove a partition and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    async fn get(&self, name: &str, key: &str) -> Result<Option<StoredResponse>>;

    async fn put(&self, name: &str, key: &str, entry: StoredResponse) -> Result<()>;

    async fn put_all(&self, name: &str, entries: Vec<(String, StoredResponse)>) -> Result<()>;

    /// Request keys stored in a partition.
    async fn entry_keys(&self, name: &str) -> Result<Vec<String>>;
}

/// Handle to one opened partition.
#[derive(Clone)]
pub struct Partition {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("name", &self.name).finish()
    }
}

impl Partition {
    pub(crate) fn new(name: impl Into<String>, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a previously stored response for this request.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        let entry = self.storage.get(&self.name, &request.cache_key()).await?;
        Ok(entry.map(StoredResponse::into_response))
    }

    /// Store a response, consuming its body.
    pub async fn put(&self, request: &Request, response: Response) -> Result<()> {
        let entry = StoredResponse::from_response(response)?;
        self.storage
            .put(&self.name, &request.cache_key(), entry)
            .await
    }

    /// Store several responses in one all-or-nothing write.
    pub async fn put_all(&self, pairs: Vec<(Request, Response)>) -> Result<()> {
        let entries = pairs
            .into_iter()
            .map(|(request, response)| {
                StoredResponse::from_response(response).map(|entry| (request.cache_key(), entry))
            })
            .collect::<Result<Vec<_>>>()?;
        self.storage.put_all(&self.name, entries).await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.storage.entry_keys(&self.name).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
