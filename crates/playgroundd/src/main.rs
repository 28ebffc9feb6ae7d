//! playgroundd — caching gateway in front of the compile backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use playground_api::ApiState;
use playground_core::config::{GatewayConfig, StoreKind};
use playground_services::{CacheStore, FsCacheStore, HttpBackend, MemoryCacheStore};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = GatewayConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = GatewayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GatewayConfig::default()
    });

    // ── Collaborators ────────────────────────────────────────────────────────
    let store: Arc<dyn CacheStore> = match config.cache.store {
        StoreKind::Memory => Arc::new(MemoryCacheStore::new()),
        StoreKind::Filesystem => Arc::new(FsCacheStore::new(&config.cache.path)?),
    };
    tracing::info!(
        store = store.kind(),
        path = %config.cache.path.display(),
        cache_failures = config.cache.cache_failures,
        "cache store ready"
    );
    if config.cache.bypass_token().is_some() {
        tracing::info!("cache bypass token configured");
    }

    let backend = HttpBackend::new(
        &config.backend.url,
        Duration::from_secs(config.backend.timeout_secs),
    )?;
    tracing::info!(url = backend.base_url(), "compile backend");

    let mut state = ApiState::new(store, Arc::new(backend));
    state.cache_failures = config.cache.cache_failures;
    state.bypass_token = config.cache.bypass_token().map(str::to_string);
    state.max_body_bytes = config.limits.max_body_bytes;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────
    let stats_printer = {
        let stats = state.stats.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATS_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let s = stats.snapshot();
                tracing::info!(
                    hits = s.hits,
                    misses = s.misses,
                    bypasses = s.bypasses,
                    passthroughs = s.passthroughs,
                    stores = s.stores,
                    store_failures = s.store_failures,
                    "gateway stats"
                );
            }
        })
    };

    let addr = format!("{}:{}", config.listen.address, config.listen.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let mut server_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(playground_api::serve(state, listener, async move {
        let _ = server_shutdown.recv().await;
    }));

    // ── Wait for exit ────────────────────────────────────────────────────────
    tokio::select! {
        r = server        => match r {
            Ok(Ok(())) => tracing::info!("gateway stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "gateway exited"),
            Err(e)     => tracing::error!(error = %e, "gateway task panicked"),
        },
        r = stats_printer => tracing::error!("stats printer exited: {:?}", r),
    }

    Ok(())
}
