//! Playground integration test harness.
//!
//! Every test runs a mock compile backend and a caching gateway on
//! ephemeral loopback ports, then drives them with the real client and
//! a headless harness:
//!
//!   cargo test --test integration
//!
//! The mock backend decides what to answer from the submitted source:
//!
//! | source contains | reply                                   |
//! |-----------------|-----------------------------------------|
//! | `compile_error` | 400 `BuildFailed` with stderr           |
//! | `slow_down`     | 429 `RateLimit` with `time_left: 3.5`   |
//! | `mystery`       | 500 with a kind nobody knows            |
//! | `malformed`     | 200 whose lengths overrun the body      |
//! | `unreachable!`  | 200 whose glue throws                   |
//! | `early_exit`    | 200 whose glue ends on the sentinel     |
//! | anything else   | 200 framed module + glue + warning      |

mod caching;
mod failures;
mod running;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;

use playground_api::ApiState;
use playground_client::harness::SENTINEL_MESSAGE;
use playground_client::{CompileClient, Harness, HeadlessLoader, Page, Playground};
use playground_core::frame::{self, FRAMED_CONTENT_TYPE};
use playground_core::{CompileRequest, ErrorKind, RequestFormat, TargetVersion, ToolchainChannel};
use playground_services::{HttpBackend, MemoryCacheStore};

// ── Mock backend ──────────────────────────────────────────────────────────────

/// Counts what reached the backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    compiles: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

pub const MODULE_PREAMBLE: &[u8] = b"\0asm\x01\0\0\0";
pub const BUILD_STDERR: &str = "error[E0425]: cannot find value `x` in this scope";

fn framed(module_tail: &str, glue: &str, diagnostic: &str) -> Response {
    let mut module = MODULE_PREAMBLE.to_vec();
    module.extend_from_slice(module_tail.as_bytes());
    let (lengths, body) = frame::encode(&module, glue, diagnostic);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, FRAMED_CONTENT_TYPE.parse().unwrap());
    for (name, value) in lengths.to_headers() {
        headers.insert(name, value.parse().unwrap());
    }
    (StatusCode::OK, headers, body).into_response()
}

fn failure(kind: &ErrorKind) -> Response {
    let status = StatusCode::from_u16(kind.status_code()).unwrap();
    json_failure(status, kind.to_body())
}

fn json_failure(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn reply(source: &str, version: &str, channel: &str) -> Response {
    if source.contains("compile_error") {
        return failure(&ErrorKind::BuildFailed {
            stdout: String::new(),
            stderr: BUILD_STDERR.to_string(),
        });
    }
    if source.contains("slow_down") {
        return failure(&ErrorKind::RateLimit { time_left: 3.5 });
    }
    if source.contains("mystery") {
        return json_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"kind":"QuantumFlux"}"#.to_vec(),
        );
    }
    if source.contains("malformed") {
        let mut headers = HeaderMap::new();
        headers.insert("module-length", "10".parse().unwrap());
        headers.insert("glue-length", "5".parse().unwrap());
        return (StatusCode::OK, headers, Bytes::from_static(b"0123456789abcd")).into_response();
    }
    if source.contains("unreachable!") {
        return framed(
            version,
            "instantiate\nsurface App\nexport exit\nthrow RuntimeError: unreachable executed\n",
            "",
        );
    }
    if source.contains("early_exit") {
        let glue = format!("instantiate\nsurface Bevy App\nexport exit\nlog booted\nthrow {SENTINEL_MESSAGE}\n");
        return framed(version, &glue, "");
    }

    let glue = format!("instantiate\nsurface App\nexport exit\nlog running on {version} ({channel})\n");
    framed(version, &glue, "warning: unused variable: `y`")
}

async fn compile_raw(
    State(mock): State<MockBackend>,
    Path((version, channel)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    mock.compiles.fetch_add(1, Ordering::SeqCst);
    reply(&String::from_utf8_lossy(&body), &version, &channel)
}

async fn compile_json(State(mock): State<MockBackend>, body: Bytes) -> Response {
    mock.compiles.fetch_add(1, Ordering::SeqCst);
    let request: CompileRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return failure(&ErrorKind::Internal),
    };
    reply(
        request.source(),
        request.target_version().as_str(),
        request.toolchain_channel().as_str(),
    )
}

async fn health(State(mock): State<MockBackend>) -> &'static str {
    mock.probes.fetch_add(1, Ordering::SeqCst);
    "ok"
}

/// Start the mock backend; returns its base URL.
pub async fn spawn_backend() -> Result<(String, MockBackend)> {
    let mock = MockBackend::default();
    let app = Router::new()
        .route("/health", get(health))
        .route("/compile", post(compile_json))
        .route("/{version}/{channel}", post(compile_raw))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), mock))
}

/// A base URL nothing listens on.
pub fn dead_url() -> Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("http://127.0.0.1:{port}"))
}

// ── Gateway ───────────────────────────────────────────────────────────────────

pub struct Gateway {
    pub url: String,
    pub store: Arc<MemoryCacheStore>,
    pub state: ApiState,
}

impl Gateway {
    pub fn api(&self, path: &str) -> String {
        format!("{}/api{}", self.url, path)
    }

    /// Block until `n` detached cache writes have landed.
    pub async fn wait_for_stores(&self, n: u64) -> Result<()> {
        for _ in 0..200 {
            if self.state.stats.snapshot().stores >= n {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!(
            "expected {n} stores, saw {}",
            self.state.stats.snapshot().stores
        )
    }
}

/// Start a gateway in front of `backend_url`. `configure` may adjust the
/// state before it starts serving.
pub async fn spawn_gateway_with(
    backend_url: &str,
    configure: impl FnOnce(&mut ApiState),
) -> Result<Gateway> {
    let store = Arc::new(MemoryCacheStore::new());
    let backend = HttpBackend::new(backend_url, Duration::from_secs(5))
        .context("backend client")?;
    let mut state = ApiState::new(store.clone(), Arc::new(backend));
    configure(&mut state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(playground_api::serve(
        state.clone(),
        listener,
        std::future::pending(),
    ));
    Ok(Gateway {
        url: format!("http://{addr}"),
        store,
        state,
    })
}

pub async fn spawn_gateway(backend_url: &str) -> Result<Gateway> {
    spawn_gateway_with(backend_url, |_| {}).await
}

/// Backend + gateway with default settings.
pub async fn stack() -> Result<(Gateway, MockBackend)> {
    let (backend_url, mock) = spawn_backend().await?;
    let gateway = spawn_gateway(&backend_url).await?;
    Ok((gateway, mock))
}

// ── Client side ───────────────────────────────────────────────────────────────

pub const MOUNT_WIDTH: f64 = 960.0;

pub fn playground(base_url: &str, format: RequestFormat) -> (Playground, Arc<HeadlessLoader>) {
    let page = Page::new();
    let mount = page.create_container(MOUNT_WIDTH);
    let loader = Arc::new(HeadlessLoader::new());
    let harness = Harness::new(page, loader.clone());
    let client = CompileClient::new(base_url).with_format(format);
    (Playground::new(client, harness, mount), loader)
}

pub fn request(source: &str) -> CompileRequest {
    CompileRequest::new(source, TargetVersion::V0_16, ToolchainChannel::Stable)
}
