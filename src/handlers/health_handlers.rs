//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the upload bucket is reachable

use crate::{
    models::image_type::{ImageType, SUPPORTED_IMAGE_TYPES},
    services::upload_service::UploadService,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness check; always 200 OK, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// HEADs the configured bucket. HTTP 200 when it exists, HTTP 503 when it is
/// missing or the backend cannot be reached. The body also lists the accepted
/// upload types.
pub async fn readyz(State(service): State<UploadService>) -> impl IntoResponse {
    let bucket_check = match service.gateway().check_bucket(service.bucket()).await {
        Ok(true) => (true, None::<String>),
        Ok(false) => (false, Some(format!("bucket `{}` does not exist", service.bucket()))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let overall_ok = bucket_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "bucket",
        CheckStatus {
            ok: bucket_check.0,
            error: bucket_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
        supported_types: &SUPPORTED_IMAGE_TYPES,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
    supported_types: &'static [ImageType],
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
