use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::api::{get_patterns, get_stats, health_check, trigger, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .route("/api/patterns", get(get_patterns))
        .route("/api/trigger", post(trigger))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind `listen` and serve the API until `shutdown_rx` turns true
pub async fn run_server(
    listen: SocketAddr,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(listen).await?;
    serve(listener, state, shutdown_rx).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    info!(addr = %listener.local_addr()?, "Web server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            info!("Web server shutting down gracefully");
        })
        .await
}
