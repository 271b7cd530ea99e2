//! API surfaces for writing series and querying cardinality
//!
//! - gRPC `seriescount.storage.v1.Storage/ReadSeriesCardinality`
//! - HTTP line protocol writes
//! - HTTP JSON cardinality and tag listing

pub mod cardinality;
pub mod grpc;
mod telemetry;
pub mod write;

use crate::query::CardinalityEngine;
use crate::{Error, Result};

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// HTTP API configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Maximum request body size
    pub max_body_size: usize,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            max_body_size: 16 * 1024 * 1024, // 16MB
            enable_cors: true,
        }
    }
}

impl From<&crate::config::ServerConfig> for ApiServerConfig {
    fn from(config: &crate::config::ServerConfig) -> Self {
        Self {
            max_body_size: config.max_body_size,
            enable_cors: config.enable_cors,
        }
    }
}

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<CardinalityEngine>,
    /// Limit on a write body after content decoding
    pub max_body_size: usize,
}

/// Build the HTTP API router
pub fn build_http_router(engine: Arc<CardinalityEngine>, config: &ApiServerConfig) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))

        // Writes
        .route("/api/v1/write", post(write::handle_write))

        // Reads
        .route("/api/v1/cardinality", get(cardinality::read_cardinality))
        .route("/api/v1/tag_keys", get(cardinality::tag_keys))
        .route("/api/v1/tag/:key/values", get(cardinality::tag_values))

        .with_state(ApiState {
            engine,
            max_body_size: config.max_body_size,
        })
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(middleware::from_fn(telemetry::http_observability_middleware));

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Serve `router` on `listener` until `shutdown` flips.
pub async fn serve_http(
    listener: TcpListener,
    router: Router,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(grpc::wait_for_shutdown(shutdown))
        .await
        .map_err(|e| Error::Internal(format!("HTTP server error: {e}")))
}

/// Map an error to a status code and JSON body.
pub(crate) fn error_response(e: Error) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(serde_json::json!({
            "error": e.to_string()
        })),
    )
        .into_response()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn ready_check() -> &'static str {
    "READY"
}
