//! `POST /api/upload`: accept a multipart image and store it.
//!
//! The file is read from the `file` form field, fully buffered, and passed to
//! `UploadService`. On success the entity tag is returned as plain text and
//! mirrored in the `ETag` header.

use crate::{
    errors::AppError,
    models::upload::UploadRequest,
    services::upload_service::UploadService,
};
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tracing::debug;

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

pub async fn upload_file(
    State(service): State<UploadService>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let request = read_file_field(multipart).await?;
    let result = service.upload(request).await?;

    let mut response = Response::new(Body::from(result.content_identifier.clone()));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    match HeaderValue::from_str(&result.content_identifier) {
        Ok(value) => {
            headers.insert(header::ETAG, value);
        }
        Err(err) => debug!(
            etag = %result.content_identifier,
            error = %err,
            "entity tag is not a valid header value, omitting ETag header"
        ),
    }
    Ok(response)
}

/// Pull the first `file` field out of the form. Other fields are skipped.
///
/// Returns `None` when the form has no `file` field; a field without a
/// filename is a bad request.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadRequest>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("field `file` is not a file upload"))?;
        let bytes = field.bytes().await?;
        return Ok(Some(UploadRequest::new(original_filename, bytes)));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::{
        routes::routes::routes,
        services::{storage_gateway::StorageGateway, upload_service::UploadService},
        test_utils::{Fault, MemoryObjectStore},
    };
    use axum::http::{StatusCode, header};
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use regex::Regex;
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};

    fn server(store: &Arc<MemoryObjectStore>, max_upload_bytes: usize) -> TestServer {
        let gateway = StorageGateway::new(store.clone(), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(10));
        let service = UploadService::new(gateway, "images", "uploads");
        TestServer::new(routes(max_upload_bytes).with_state(service)).unwrap()
    }

    fn image_form(name: &str, bytes: &'static [u8]) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(name))
    }

    #[tokio::test]
    async fn uploads_png_and_returns_entity_tag() {
        let store = Arc::new(MemoryObjectStore::default());
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(image_form("cat.png", b"\x89PNG\r\n\x1a\n"))
            .await;

        response.assert_status_ok();
        let etag = response.text();
        assert!(!etag.is_empty());
        assert_eq!(
            response.headers().get(header::ETAG).unwrap().to_str().unwrap(),
            etag
        );

        let keys = store.keys("images");
        assert_eq!(keys.len(), 1);
        let name = keys[0].strip_prefix("uploads/").unwrap();
        assert!(Regex::new(r"^\d+-cat\.png$").unwrap().is_match(name));
        assert_eq!(
            store.object("images", &keys[0]).unwrap().content_type,
            "image/png"
        );
    }

    #[tokio::test]
    async fn rejects_unsupported_extension_before_storage() {
        let store = Arc::new(MemoryObjectStore::default());
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(image_form("cat.bmp", b"BM"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("cat.bmp"));
        assert!(message.contains("png,jpeg,jpg"));
        assert_eq!(body["status"], 400);
        assert_eq!(store.head_calls(), 0);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let store = Arc::new(MemoryObjectStore::default());
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("note", "no file here"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn file_field_without_filename_is_bad_request() {
        let store = Arc::new(MemoryObjectStore::default());
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("file", "not a file"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backend_put_failure_is_bad_gateway() {
        let store =
            Arc::new(MemoryObjectStore::with_bucket("images").with_fault(Fault::PutObject));
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(image_form("cat.png", b"png"))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("put_object"));
    }

    #[tokio::test]
    async fn transient_bucket_failure_is_service_unavailable() {
        let store = Arc::new(MemoryObjectStore::default().with_fault(Fault::HeadBucket));
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(image_form("cat.jpg", b"jpg"))
            .await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn entity_tag_unfit_for_header_is_still_returned_in_body() {
        let store = Arc::new(
            MemoryObjectStore::with_bucket("images").with_fault(Fault::MalformedEntityTag),
        );
        let server = server(&store, 1024);

        let response = server
            .post("/api/upload")
            .multipart(image_form("cat.png", b"png"))
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "tag\nsplit");
        assert!(response.headers().get(header::ETAG).is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let store = Arc::new(MemoryObjectStore::with_bucket("images"));
        let server = server(&store, 64);

        let response = server
            .post("/api/upload")
            .multipart(image_form("big.png", &[0u8; 4096]))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.put_calls(), 0);
    }
}
