//! Palaver dashboard HTTP API (Axum).
//!
//! Read-mostly endpoints over the live session store and the durable
//! SQLite record: health, statistics, per-user history, message search.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::stats_routes())
        .merge(routes::user_routes())
        .merge(routes::message_routes())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "dashboard API listening");
    axum::serve(listener, app_with_state(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
