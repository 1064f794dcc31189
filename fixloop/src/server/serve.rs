//! HTTP server setup

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::LoopError;
use crate::server::handlers::{errors_handler, health_handler};
use crate::server::state::ServerState;

/// Routes of the push receiver
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/errors", post(errors_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and start the push receiver. Returns the bound address and the
/// server task.
pub async fn serve(
    bind: &str,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, JoinHandle<Result<(), LoopError>>), LoopError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| LoopError::ServerError(format!("bind {}: {}", bind, e)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| LoopError::ServerError(e.to_string()))?;
    info!("Starting push receiver on {}", addr);

    let app = router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| LoopError::ServerError(e.to_string()))
    });

    Ok((addr, handle))
}
