// Request and response types seen by the worker.
// Models the subset of the fetch API the router and strategies depend on.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, WorkerError};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// What the requesting page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// fetch() / XHR with no particular destination.
    #[default]
    Empty,
    /// Top-level page load.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
}

impl Destination {
    /// Script, style and image loads are immutable per deploy.
    pub fn is_static_asset(&self) -> bool {
        matches!(
            self,
            Destination::Script | Destination::Style | Destination::Image
        )
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "empty" => Ok(Destination::Empty),
            "document" => Ok(Destination::Document),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            other => Err(format!("unknown destination: {}", other)),
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub destination: Destination,
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Create a GET request with no destination.
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::from_url(Url::parse(url)?))
    }

    /// Create a GET request for a top-level document load.
    pub fn navigate(url: &str) -> Result<Self> {
        Ok(Self::get(url)?.with_destination(Destination::Document))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            destination: Destination::Empty,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Key used to store and look up this request in a cache partition.
    /// Fragments never reach the network, so they are not part of the key.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseSource {
    #[default]
    Network,
    Cache,
}

/// A response whose body can be read exactly once.
///
/// Call [`Response::try_clone`] before reading when two consumers need the
/// bytes (e.g. the cache and the page).
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub source: ResponseSource,
    body: Option<Vec<u8>>,
    body_used: bool,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            url: String::new(),
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            source: ResponseSource::Network,
            body: None,
            body_used: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_used(&self) -> bool {
        self.body_used
    }

    pub fn is_from_cache(&self) -> bool {
        self.source == ResponseSource::Cache
    }

    /// Consume the body. A second call fails with [`WorkerError::BodyUsed`].
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        if self.body_used {
            return Err(WorkerError::BodyUsed);
        }
        self.body_used = true;
        Ok(self.body.take().unwrap_or_default())
    }

    /// Consume the body as UTF-8 text (lossy).
    pub fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Produce an independent copy with its own unread body.
    pub fn try_clone(&self) -> Result<Response> {
        if self.body_used {
            return Err(WorkerError::BodyUsed);
        }
        Ok(Response {
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            source: self.source,
            body: self.body.clone(),
            body_used: false,
        })
    }
}

/// Canonical reason phrase for common status codes.
pub(crate) fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
