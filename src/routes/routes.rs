//! Defines the HTTP surface of the upload gateway.
//!
//! ## Structure
//! - `POST /api/upload`: multipart upload, field `file`; returns the entity tag
//! - `GET  /healthz`   : liveness
//! - `GET  /readyz`    : readiness (bucket reachable)

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::upload_file,
    },
    services::upload_service::UploadService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router.
///
/// The router carries shared state (`UploadService`) to all handlers. Upload
/// bodies larger than `max_upload_bytes` are rejected with 413.
pub fn routes(max_upload_bytes: usize) -> Router<UploadService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}
