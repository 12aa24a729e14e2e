//! Marquette HTTP API
//!
//! HTTP layer for the relay, built with Axum.
//!
//! # Endpoints
//!
//! ## Event stream
//! - `GET /update-stream` - Server-Sent Events, one `data:` frame per broker message
//!
//! ## Topics
//! - `GET /topics` - Latest payload of every topic seen
//! - `GET /topics/*topic` - Latest payload of one topic (plain text)
//! - `POST /topics/*topic` - Publish a payload to the broker
//!
//! ## Tiles
//! - `GET /tiles` - Dashboard tile layout
//! - `POST /tiles`, `PUT /tiles` - Replace the tile layout
//!
//! ## Health
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check
//! - `GET /health` - Full health status

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::stream::stream_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    Router::new()
        .route("/update-stream", get(stream_handler))
        .route("/topics", get(routes::topics::list_topics))
        .route(
            "/topics/*topic",
            get(routes::topics::get_topic).post(routes::topics::publish_topic),
        )
        .route(
            "/tiles",
            get(routes::tiles::list_tiles)
                .post(routes::tiles::replace_tiles)
                .put(routes::tiles::replace_tiles),
        )
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
}

/// Start the HTTP server
///
/// On shutdown every open event stream is closed so that in-flight
/// responses can complete.
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.addr();
    let hub = Arc::clone(state.hub());
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Marquette listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            hub.close_all();
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("HTTP server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
