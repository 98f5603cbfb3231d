// Strategy handlers.
// Cache/network precedence and fallback chains for each route.

use std::sync::Arc;

use url::Url;

use crate::cache::CacheManager;
use crate::error::{Result, WorkerError};
use crate::http::{Network, Request, Response};
use crate::router::Route;

pub struct Strategies {
    cache: Arc<CacheManager>,
    network: Arc<dyn Network>,
    offline_document: Url,
}

impl Strategies {
    pub fn new(cache: Arc<CacheManager>, network: Arc<dyn Network>, offline_document: Url) -> Self {
        Self {
            cache,
            network,
            offline_document,
        }
    }

    /// Serve a classified request. `None` means the request is not handled.
    pub async fn respond(&self, route: Route, request: &Request) -> Result<Option<Response>> {
        let response = match route {
            Route::Navigation => self.navigation(request).await?,
            Route::StaticAsset => self.static_asset(request).await?,
            Route::Api => self.api(request).await?,
            Route::Ignored => return Ok(None),
        };
        Ok(Some(response))
    }

    /// Network-first; the network response is returned uncached.
    /// Offline: exact match, then the offline document, then the error.
    pub async fn navigation(&self, request: &Request) -> Result<Response> {
        let error = match self.network.fetch(request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        tracing::warn!(url = %request.url, error = %error, "navigation fetch failed");

        if let Some(cached) = self.cached(request).await {
            return Ok(cached);
        }

        let fallback = Request::from_url(self.offline_document.clone());
        if let Some(cached) = self.cached(&fallback).await {
            tracing::info!(url = %request.url, "serving offline document");
            return Ok(cached);
        }

        Err(offline(request, error))
    }

    /// Cache-first; successful network responses are copied into the dynamic partition.
    pub async fn static_asset(&self, request: &Request) -> Result<Response> {
        if let Some(cached) = self.cached(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(cached);
        }

        let response = self.network.fetch(request).await.map_err(|e| {
            tracing::warn!(url = %request.url, error = %e, "asset fetch failed");
            offline(request, e)
        })?;

        self.store_dynamic(request, &response).await;
        Ok(response)
    }

    /// Network-first with a cached copy kept for offline use.
    pub async fn api(&self, request: &Request) -> Result<Response> {
        let error = match self.network.fetch(request).await {
            Ok(response) => {
                self.store_dynamic(request, &response).await;
                return Ok(response);
            }
            Err(e) => e,
        };
        tracing::warn!(url = %request.url, error = %error, "api fetch failed");

        match self.cached(request).await {
            Some(cached) => Ok(cached),
            None => Err(offline(request, error)),
        }
    }

    /// Cache lookup where an unreadable entry counts as a miss.
    async fn cached(&self, request: &Request) -> Option<Response> {
        match self.cache.match_request(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Copy a 2xx response into the dynamic partition. The caller keeps
    /// the original; write failures are logged and otherwise ignored.
    async fn store_dynamic(&self, request: &Request, response: &Response) {
        if !response.ok() {
            tracing::debug!(url = %request.url, status = response.status, "not caching");
            return;
        }

        if let Err(e) = self.put_dynamic(request, response).await {
            tracing::warn!(url = %request.url, error = %e, "cache write failed");
        }
    }

    async fn put_dynamic(&self, request: &Request, response: &Response) -> Result<()> {
        let copy = response.try_clone()?;
        let partition = self.cache.dynamic_partition().await?;
        partition.put(request, copy).await
    }
}

/// Network errors keep their cause; everything else becomes `Offline`.
fn offline(request: &Request, error: WorkerError) -> WorkerError {
    if error.is_network() {
        error
    } else {
        WorkerError::Offline {
            url: request.url.to_string(),
        }
    }
}
