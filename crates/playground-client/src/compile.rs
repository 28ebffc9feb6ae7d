//! Compile round trip: submit a request, decode the framed reply.

use bytes::Bytes;
use tracing::debug;

use playground_core::frame::{self, FrameLengths};
use playground_core::{CompileRequest, ErrorReport, FramedResponse, RequestFormat};

use crate::failure::Failure;

/// Response header the gateway uses to report cache outcome.
const CACHE_STATUS_HEADER: &str = "origin-cache-status";

/// A decoded successful compile.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub framed: FramedResponse,
    /// `HIT`, `MISS`, … when the reply came through a caching gateway.
    pub cache_status: Option<String>,
}

/// HTTP client for the compile service (directly or through a gateway).
#[derive(Clone)]
pub struct CompileClient {
    inner: reqwest::Client,
    base_url: String,
    format: RequestFormat,
}

impl CompileClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            format: RequestFormat::Raw,
        }
    }

    pub fn with_format(mut self, format: RequestFormat) -> Self {
        self.format = format;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit `request` and decode the reply.
    ///
    /// A non-2xx reply is parsed as a failure body. A 2xx reply whose
    /// length headers are missing or do not fit the body fails with
    /// `MalformedFrame`.
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, Failure> {
        let url = format!("{}{}", self.base_url, request.route(self.format));
        debug!(url = %url, version = %request.target_version(), channel = %request.toolchain_channel(), "compiling");

        let mut builder = self.inner.post(&url).body(request.body(self.format));
        if self.format == RequestFormat::Json {
            builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        }
        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let cache_status = headers
            .get(CACHE_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            debug!(status = status.as_u16(), cache = ?cache_status, "compile failed");
            return Err(ErrorReport::parse(&body).into());
        }

        let lengths =
            FrameLengths::from_headers(|name| headers.get(name).and_then(|v| v.to_str().ok()))?;
        let framed = decode(body, lengths)?;
        debug!(
            module = framed.module_bytes.len(),
            glue = framed.glue_text.len(),
            cache = ?cache_status,
            "compiled"
        );
        Ok(CompileOutput {
            framed,
            cache_status,
        })
    }
}

fn decode(body: Bytes, lengths: FrameLengths) -> Result<FramedResponse, Failure> {
    frame::decode(body, lengths).map_err(|e| {
        tracing::warn!(error = %e, "malformed compile response");
        Failure::from(e)
    })
}
