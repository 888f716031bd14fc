mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dashboard::Dashboard;
pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/location", get(handlers::location))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/contact/validate", post(handlers::validate_contact))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API and keep the dashboard fresh until Ctrl+C.
pub async fn start(
    dashboard: Arc<Dashboard>,
    host: &str,
    port: u16,
    refresh_every: Duration,
) -> std::io::Result<()> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        dashboard: dashboard.clone(),
        shutdown: shutdown.clone(),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "vantage server listening");

    let refresher = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { dashboard.run_periodic(refresh_every, &shutdown).await })
    };

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutting down");
                    shutdown.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "cannot listen for Ctrl+C");
                    shutdown.cancelled().await;
                }
            }
        }
    };

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .await;

    shutdown.cancel();
    if let Err(e) = refresher.await {
        tracing::warn!(error = %e, "refresh loop ended abnormally");
    }
    served
}
