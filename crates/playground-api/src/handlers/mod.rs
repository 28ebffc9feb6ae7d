//! Operator endpoints and the state shared by every handler.

pub mod status;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;

use playground_services::{Backend, CacheStore};

use crate::gateway::CACHE_BYPASS_HEADER;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn CacheStore>,
    pub backend: Arc<dyn Backend>,
    pub stats: Arc<GatewayStats>,
    /// Store non-2xx backend responses as well as successes.
    pub cache_failures: bool,
    /// Value of `cache-bypass` that skips the lookup. `None` = bypass disabled.
    pub bypass_token: Option<String>,
    /// Largest request body read before refusing with 413.
    pub max_body_bytes: usize,
}

impl ApiState {
    pub fn new(store: Arc<dyn CacheStore>, backend: Arc<dyn Backend>) -> Self {
        Self {
            store,
            backend,
            stats: Arc::new(GatewayStats::default()),
            cache_failures: true,
            bypass_token: None,
            max_body_bytes: 256 * 1024,
        }
    }

    /// True when the request presents the configured bypass token.
    pub(crate) fn bypass_requested(&self, headers: &HeaderMap) -> bool {
        match (&self.bypass_token, headers.get(CACHE_BYPASS_HEADER)) {
            (Some(token), Some(value)) => value.as_bytes() == token.as_bytes(),
            _ => false,
        }
    }

    pub(crate) fn should_store(&self, status: u16) -> bool {
        (200..300).contains(&status) || self.cache_failures
    }
}

// ── Counters ──────────────────────────────────────────────────────────────────

/// Process-lifetime gateway counters.
#[derive(Debug, Default)]
pub struct GatewayStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub bypasses: AtomicU64,
    pub passthroughs: AtomicU64,
    pub stores: AtomicU64,
    pub store_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub passthroughs: u64,
    pub stores: u64,
    pub store_failures: u64,
}

impl GatewayStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            passthroughs: self.passthroughs.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub use status::{handle_cache, handle_cache_clear, handle_health};
