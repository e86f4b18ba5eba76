use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::{
    api::{get_fees, get_raw_fees, publish_fees, update_fees},
    service::FeeService,
};

/// Create the Axum application router
pub fn create_app(service: Arc<FeeService>) -> Router {
    Router::new()
        // Fee endpoints
        .route("/fees", get(get_fees))
        .route("/fees/update", get(update_fees).post(update_fees))
        .route("/fees/raw", get(get_raw_fees))
        .route("/publish", post(publish_fees))
        // Health check endpoint
        .route("/health", get(health_check))
        // Add shared state
        .with_state(service)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Run the HTTP server
pub async fn run_server(app: Router, host: String, port: u16) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on http://{}", addr);
    info!("API endpoints:");
    info!("  GET /fees?targets=3,7 - Current fees, with optional extra targets");
    info!("  GET|POST /fees/update - Recompute fees unless the cache is fresh");
    info!("  GET /fees/raw - Source estimates behind the current fees");
    info!("  POST /publish - Publish a summary if fees moved");
    info!("  GET /health - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Received shutdown signal, shutting down gracefully...");
}
