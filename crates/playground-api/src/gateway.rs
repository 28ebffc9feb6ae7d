//! Content-addressed compile gateway.
//!
//! `POST` bodies are hashed together with their route; a stored response
//! for that identity is replayed without touching the backend. On a miss
//! the request is forwarded unchanged and a copy of the reply is written
//! to the store from a detached task the response never waits on.
//!
//! `GET` and `OPTIONS` are relayed uncached. Anything else is refused.

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use playground_core::{ErrorKind, StoreKey};
use playground_services::{BackendRequest, BackendResponse, CacheEntry};

use crate::handlers::{ApiState, GatewayStats};

/// Response header reporting how the gateway served a request.
pub const CACHE_STATUS_HEADER: &str = "origin-cache-status";

/// Request header carrying the operator bypass token.
pub const CACHE_BYPASS_HEADER: &str = "cache-bypass";

const ALLOWED_METHODS: &str = "GET, OPTIONS, POST";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Replayed from the store.
    Hit,
    /// Looked up, not found, forwarded.
    Miss,
    /// Lookup skipped on request, forwarded.
    Bypass,
    /// Not a cacheable request.
    Pass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
            CacheStatus::Pass => "PASS",
        }
    }
}

/// Fallback handler for every non-operator path.
pub async fn intercept(State(state): State<ApiState>, request: Request) -> Response {
    match *request.method() {
        Method::POST => compile(state, request).await,
        Method::GET | Method::OPTIONS => passthrough(state, request).await,
        _ => {
            debug!(method = %request.method(), path = %request.uri().path(), "method refused");
            method_not_allowed()
        }
    }
}

// ── Compile (cached) ──────────────────────────────────────────────────────────

async fn compile(state: ApiState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match read_body(&parts.headers, body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let key = StoreKey::for_request(parts.uri.path(), &body);
    let status = if state.bypass_requested(&parts.headers) {
        GatewayStats::bump(&state.stats.bypasses);
        CacheStatus::Bypass
    } else {
        if let Some(entry) = lookup(&state, &key).await {
            GatewayStats::bump(&state.stats.hits);
            info!(key = %key, status = entry.status, "hit");
            return replay(entry);
        }
        GatewayStats::bump(&state.stats.misses);
        CacheStatus::Miss
    };

    let mut headers = parts.headers;
    headers.remove(CACHE_BYPASS_HEADER);
    let forwarded = BackendRequest {
        method: parts.method,
        path_and_query: path_and_query(&parts.uri),
        headers,
        body,
    };

    let response = match state.backend.forward(forwarded).await {
        Ok(response) => response,
        Err(e) => {
            error!(key = %key, error = %e, "backend unreachable");
            return unreachable_response(status);
        }
    };

    info!(key = %key, status = response.status.as_u16(), outcome = status.as_str(), "forwarded");

    if state.should_store(response.status.as_u16()) {
        spawn_store(&state, key, &response, matches!(status, CacheStatus::Bypass));
    }
    relay(response, status)
}

/// Stored entry for `key`, if any. Store errors and undecodable entries
/// are logged and read as a miss.
async fn lookup(state: &ApiState, key: &StoreKey) -> Option<CacheEntry> {
    let raw = match state.store.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key = %key, error = %e, "cache read failed");
            return None;
        }
    };
    match CacheEntry::decode(raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(key = %key, error = %e, "corrupt cache entry ignored");
            None
        }
    }
}

/// Write the response to the store without holding up the caller.
/// `overwrite` replaces an existing entry instead of keeping it.
fn spawn_store(state: &ApiState, key: StoreKey, response: &BackendResponse, overwrite: bool) {
    let entry = CacheEntry::new(
        response.status.as_u16(),
        response
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        response.body.clone(),
    );
    let store = state.store.clone();
    let stats = state.stats.clone();

    tokio::spawn(async move {
        let result = match entry.encode() {
            Ok(raw) if overwrite => store.replace(&key, raw).await,
            Ok(raw) => store.put(&key, raw).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                GatewayStats::bump(&stats.stores);
                debug!(key = %key, "stored");
            }
            Err(e) => {
                GatewayStats::bump(&stats.store_failures);
                warn!(key = %key, error = %e, "cache write failed");
            }
        }
    });
}

// ── Passthrough ───────────────────────────────────────────────────────────────

async fn passthrough(state: ApiState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match read_body(&parts.headers, body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    GatewayStats::bump(&state.stats.passthroughs);

    let forwarded = BackendRequest {
        method: parts.method.clone(),
        path_and_query: path_and_query(&parts.uri),
        headers: parts.headers,
        body,
    };
    match state.backend.forward(forwarded).await {
        Ok(response) => {
            info!(method = %parts.method, path = %parts.uri.path(), status = response.status.as_u16(), "passthrough");
            relay(response, CacheStatus::Pass)
        }
        Err(e) => {
            error!(path = %parts.uri.path(), error = %e, "backend unreachable");
            unreachable_response(CacheStatus::Pass)
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, Response> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|n| n > limit) {
        return Err(too_large(limit));
    }
    body::to_bytes(body, limit).await.map_err(|e| {
        debug!(error = %e, limit, "request body rejected");
        too_large(limit)
    })
}

fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn relay(response: BackendResponse, status: CacheStatus) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    stamp(&mut out, status);
    out
}

fn replay(entry: CacheEntry) -> Response {
    let mut out = Response::new(Body::from(entry.body));
    *out.status_mut() = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    for (name, value) in &entry.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            out.headers_mut().append(name, value);
        }
    }
    stamp(&mut out, CacheStatus::Hit);
    out
}

fn stamp(response: &mut Response, status: CacheStatus) {
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(status.as_str()),
    );
}

fn error_response(kind: &ErrorKind, status: StatusCode, cache: CacheStatus) -> Response {
    let mut out = (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        kind.to_body(),
    )
        .into_response();
    stamp(&mut out, cache);
    out
}

/// Synthesized locally, so never stored.
fn unreachable_response(cache: CacheStatus) -> Response {
    error_response(&ErrorKind::Internal, StatusCode::BAD_GATEWAY, cache)
}

fn method_not_allowed() -> Response {
    let mut out = error_response(
        &ErrorKind::MethodNotAllowed,
        StatusCode::METHOD_NOT_ALLOWED,
        CacheStatus::Pass,
    );
    out.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    out
}

fn too_large(limit: usize) -> Response {
    let mut out = (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {limit} bytes"),
    )
        .into_response();
    stamp(&mut out, CacheStatus::Pass);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
