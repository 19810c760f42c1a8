//! REST API for clear-sky forecasts.
//!
//! Provides two endpoints:
//! - `POST /clearsky/{plant_name}/{interval}`: forecast one plant or `all`
//! - `GET /plants`: configured plant names

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};

use crate::engine::pipeline::ForecastPipeline;

pub use types::{ErrorResponse, WindowBody};

/// Application state shared across all request handlers.
///
/// The pipeline holds no per-request state, so handlers share it without locks.
pub struct AppState {
    /// Forecast pipeline run for every request.
    pub pipeline: Arc<ForecastPipeline>,
    /// Deadline for one whole request pipeline.
    pub request_timeout: Duration,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/clearsky/{plant_name}/{interval}", post(handlers::post_clearsky))
        .route("/plants", get(handlers::get_plants))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind to `addr` or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
