//! WFS API service library.
//!
//! Exposes the router, engines and configuration so they can be driven
//! from integration tests without a running server.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod query;
pub mod state;
pub mod transaction;

use axum::{extract::Extension, routing::get, Router};
use std::sync::Arc;

use state::AppState;

/// WFS and health routes. `/metrics` is added by the binary, which owns the
/// Prometheus recorder.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::wfs_get_handler).post(handlers::wfs_post_handler),
        )
        .route(
            "/wfs",
            get(handlers::wfs_get_handler).post(handlers::wfs_post_handler),
        )
        .route(
            "/wfs/",
            get(handlers::wfs_get_handler).post(handlers::wfs_post_handler),
        )
        .route("/health", get(handlers::health_handler))
        .layer(Extension(state))
}
