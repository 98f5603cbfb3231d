// Fetch router.
// Classifies intercepted requests so each is served by exactly one strategy.

use url::{Origin, Url};

use crate::http::{Method, Request};

/// Path prefix for the proxied ERP endpoints.
pub const API_PREFIX: &str = "/api/";

/// Which strategy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Page load: network-first, falls back to the offline document.
    Navigation,
    /// Script, style or image: cache-first.
    StaticAsset,
    /// `/api/` or another origin: network-first.
    Api,
    /// Not intercepted; the default network behavior applies.
    Ignored,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Navigation => "navigation",
            Route::StaticAsset => "static-asset",
            Route::Api => "api",
            Route::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    origin: Origin,
}

impl Router {
    /// `scope` is any URL on the worker's own origin.
    pub fn new(scope: &Url) -> Self {
        Self {
            origin: scope.origin(),
        }
    }

    /// Classify a request. First match wins: destination checks run before
    /// the origin check, so a cross-origin image is still a static asset.
    pub fn classify(&self, request: &Request) -> Route {
        if request.method != Method::Get {
            return Route::Ignored;
        }

        if request.is_navigation() {
            Route::Navigation
        } else if request.destination.is_static_asset() {
            Route::StaticAsset
        } else if request.url.path().starts_with(API_PREFIX) || !self.is_same_origin(&request.url) {
            Route::Api
        } else {
            Route::Ignored
        }
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }
}
