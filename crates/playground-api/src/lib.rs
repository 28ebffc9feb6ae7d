//! playground-api — the caching gateway as an axum service.
//!
//! Everything under `/api` is operator surface. Every other path is a
//! compile route and goes through [`gateway::intercept`].

pub mod gateway;
pub mod handlers;

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use gateway::{CacheStatus, CACHE_BYPASS_HEADER, CACHE_STATUS_HEADER};
pub use handlers::{ApiState, GatewayStats, StatsSnapshot};

/// Build the full gateway router.
pub fn router(state: ApiState) -> Router {
    // Preflights on compile routes belong to the backend, so CORS is only
    // answered locally for the operator endpoints.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/cache", get(handlers::handle_cache))
        .route("/cache/clear", post(handlers::handle_cache_clear))
        .layer(cors);

    Router::new()
        .nest("/api", api_routes)
        .fallback(gateway::intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(state: ApiState, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
