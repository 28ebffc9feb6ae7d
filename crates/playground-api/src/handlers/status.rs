//! /health, /cache, /cache/clear handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{ApiState, StatsSnapshot};

// ── /health ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

pub async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.store.kind(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── /cache ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CacheInfo {
    pub store: &'static str,
    /// `None` when the store cannot report usage.
    pub entries: Option<usize>,
    pub bytes: Option<u64>,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}

pub async fn handle_cache(State(state): State<ApiState>) -> Json<CacheInfo> {
    let usage = match state.store.usage().await {
        Ok(usage) => usage,
        Err(e) => {
            tracing::warn!(error = %e, "cache usage unavailable");
            None
        }
    };

    Json(CacheInfo {
        store: state.store.kind(),
        entries: usage.map(|u| u.entries),
        bytes: usage.map(|u| u.bytes),
        stats: state.stats.snapshot(),
    })
}

// ── /cache/clear ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

pub async fn handle_cache_clear(
    State(state): State<ApiState>,
) -> Result<Json<ClearResponse>, (StatusCode, String)> {
    let cleared = state.store.clear().await.map_err(|e| {
        tracing::warn!(error = %e, "cache clear failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    tracing::info!(cleared, "cache cleared via API");
    Ok(Json(ClearResponse { cleared }))
}
