//! Compile backend forwarding.
//!
//! The gateway never interprets a compile; it hands the request to the
//! backend unchanged and relays whatever comes back.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode};
use tracing::debug;

/// A request as the gateway received it.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    /// Path plus query string, e.g. `/0.16/stable`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The backend's reply, fully buffered.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Where requests are forwarded. An `Err` means the backend could not be
/// reached or did not answer; any HTTP status at all is an `Ok`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn forward(&self, request: BackendRequest) -> Result<BackendResponse>;
}

/// Headers that describe one hop and must not be relayed.
static HOP_BY_HOP: [header::HeaderName; 7] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Forwards over HTTP to a fixed base URL.
#[derive(Clone)]
pub struct HttpBackend {
    inner: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend client")?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn forward(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = format!("{}{}", self.base_url, request.path_and_query);
        debug!(method = %request.method, url = %url, bytes = request.body.len(), "forwarding");

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);

        let response = self
            .inner
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .with_context(|| format!("backend unreachable at {url}"))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("backend response from {url} cut short"))?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}
