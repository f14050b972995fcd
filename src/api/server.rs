use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{health, serve_thumbnail},
    state::AppState,
};
use crate::config::Config;
use crate::storage::StorageClient;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Builds the HTTP router: `/health` plus the thumbnail grammar as fallback
pub fn router(state: AppState) -> Router {
    let request_timeout = state.config.server.request_timeout();

    Router::new()
        .route("/health", get(health))
        .fallback(serve_thumbnail)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Bounds the time until response headers; streamed bodies are covered by the stall timeout
        .layer(TimeoutLayer::new(request_timeout))
}

/// Runs the server until Ctrl+C or SIGTERM
pub async fn run(config: Config) -> Result<(), AnyError> {
    info!(
        provider = ?config.storage.provider,
        bucket = %config.storage.bucket,
        endpoint = %config.storage.endpoint,
        "Connecting to object store"
    );
    let storage = StorageClient::from_config(&config.storage)
        .map_err(|e| format!("Failed to initialize storage: {}", e))?;

    let address = config.server.bind_addr;
    let state = AppState::new(config, storage);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "ThumbBox listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
