// Network access for the worker.
// Defines the Network seam and its reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};

use crate::error::{Result, WorkerError};

use super::types::{Method, Request, Response, ResponseSource, status_text_for};

pub const DEFAULT_USER_AGENT: &str = concat!("kl-timetable-sw/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can turn a request into a response.
///
/// Transport failures are `Err`. Non-2xx statuses are `Ok` and left to the
/// caller to judge via [`Response::ok`].
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// HTTP client used outside of tests.
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| WorkerError::Other(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(WorkerError::Network)?;

        Ok(Self { client })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.clone());

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WorkerError::Other(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| WorkerError::Other(e.to_string()))?;
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(WorkerError::Network)?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(WorkerError::Network)?;

        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), "network response");

        let status_text = status
            .canonical_reason()
            .unwrap_or_else(|| status_text_for(status.as_u16()));

        let mut out = Response::new(status.as_u16())
            .with_url(url)
            .with_status_text(status_text)
            .with_source(ResponseSource::Network)
            .with_body(body.to_vec());
        out.headers = headers;
        Ok(out)
    }
}
