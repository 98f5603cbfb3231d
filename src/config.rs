// Worker configuration.
// Defaults, environment overrides and URL resolution against the worker origin.

use std::path::PathBuf;

use url::Url;

use crate::cache::{CacheVersion, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION, paths};
use crate::error::{Result, WorkerError};
use crate::http::DEFAULT_USER_AGENT;

pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_OFFLINE_DOCUMENT: &str = "/index.html";

/// Critical files cached at install.
pub const STATIC_MANIFEST: [&str; 3] = ["/", "/index.html", "/manifest.json"];

#[derive(Debug, Clone)]
pub struct Config {
    /// Origin the worker is registered on; anything else is cross-origin.
    pub origin: Url,
    pub cache_prefix: String,
    pub cache_version: String,
    /// Paths cached at install, relative to `origin`.
    pub static_manifest: Vec<String>,
    /// Served for navigations when offline and nothing else matches.
    pub offline_document: String,
    /// Root of the on-disk cache; `None` uses the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            static_manifest: STATIC_MANIFEST.iter().map(|p| p.to_string()).collect(),
            offline_document: DEFAULT_OFFLINE_DOCUMENT.to_string(),
            cache_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `KLTT_ORIGIN`, `KLTT_CACHE_VERSION`,
    /// `KLTT_CACHE_DIR` and `KLTT_OFFLINE_DOCUMENT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(origin) = lookup("KLTT_ORIGIN") {
            config.origin = Url::parse(&origin)?;
        }
        if let Some(version) = lookup("KLTT_CACHE_VERSION") {
            config.cache_version = version;
        }
        if let Some(dir) = lookup("KLTT_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(doc) = lookup("KLTT_OFFLINE_DOCUMENT") {
            config.offline_document = doc;
        }

        Ok(config)
    }

    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(&self.cache_prefix, &self.cache_version)
    }

    /// Resolve a path (or absolute URL) against the worker origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.origin.join(path)?)
    }

    pub fn static_urls(&self) -> Result<Vec<Url>> {
        self.static_manifest.iter().map(|p| self.resolve(p)).collect()
    }

    pub fn offline_document_url(&self) -> Result<Url> {
        self.resolve(&self.offline_document)
    }

    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::cache_dir()
                .ok_or_else(|| WorkerError::Other("no cache directory available".to_string())),
        }
    }
}
