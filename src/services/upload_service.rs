//! Upload pipeline: name and validate the incoming file, then hand it to the
//! storage gateway under the configured key prefix.

use crate::{
    models::{
        image_type,
        upload::{PreparedUpload, UploadRequest, UploadResult},
    },
    services::storage_gateway::{StorageError, StorageGateway},
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid data found in request: {0}")]
    InvalidInput(String),
    #[error(
        "image file extension is not supported. File name: {filename}. Supported image extensions: {}",
        .supported.join(",")
    )]
    UnsupportedFileType {
        filename: String,
        supported: Vec<String>,
    },
    #[error("extension `{0}` passed validation but has no registered content type")]
    UnmappedExtension(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type UploadOutcome<T> = Result<T, UploadError>;

/// `{epochSeconds}-{filename}` for the given instant.
pub fn object_name(original_filename: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp(), original_filename)
}

/// Join the key prefix and object name without doubling the separator.
pub fn object_key(prefix: &str, object_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        object_name.to_string()
    } else {
        format!("{}/{}", prefix, object_name)
    }
}

/// Keep only the last path segment of a client-supplied filename.
fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Validate and name an upload. Pure: no storage access.
pub fn prepare_upload(
    request: Option<UploadRequest>,
    now: DateTime<Utc>,
) -> UploadOutcome<PreparedUpload> {
    let request =
        request.ok_or_else(|| UploadError::InvalidInput("no file part in request".into()))?;

    let filename = base_name(request.original_filename.trim());
    if filename.is_empty() {
        return Err(UploadError::InvalidInput("file has no name".into()));
    }

    let object_name = object_name(filename, now);
    if !image_type::is_valid_extension_file(&object_name) {
        return Err(UploadError::UnsupportedFileType {
            filename: request.original_filename.clone(),
            supported: image_type::supported_extensions()
                .into_iter()
                .map(String::from)
                .collect(),
        });
    }

    let extension = object_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default();
    let content_type = image_type::content_type_for(&extension)
        .ok_or_else(|| UploadError::UnmappedExtension(extension.clone()))?;

    let byte_length = request.bytes.len();
    Ok(PreparedUpload {
        object_name,
        extension,
        content_type,
        bytes: request.bytes,
        byte_length,
    })
}

/// Shared handler state: the gateway plus the destination settings.
#[derive(Clone)]
pub struct UploadService {
    gateway: StorageGateway,
    bucket: String,
    key_prefix: String,
}

impl UploadService {
    pub fn new(
        gateway: StorageGateway,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn gateway(&self) -> &StorageGateway {
        &self.gateway
    }

    /// Validate, ensure the bucket, and store the file. Uses the wall clock.
    pub async fn upload(&self, request: Option<UploadRequest>) -> UploadOutcome<UploadResult> {
        self.upload_at(request, Utc::now()).await
    }

    pub async fn upload_at(
        &self,
        request: Option<UploadRequest>,
        now: DateTime<Utc>,
    ) -> UploadOutcome<UploadResult> {
        if let Some(req) = &request {
            info!(
                original_filename = %req.original_filename,
                bytes = req.bytes.len(),
                "starting upload"
            );
        }

        let prepared = prepare_upload(request, now).inspect_err(|err| {
            warn!(error = %err, "upload rejected");
        })?;
        debug!(
            object_name = %prepared.object_name,
            extension = %prepared.extension,
            content_type = prepared.content_type,
            "upload validated"
        );

        self.gateway.ensure_bucket(&self.bucket).await?;

        let key = object_key(&self.key_prefix, &prepared.object_name);
        let content_identifier = self
            .gateway
            .upload(&self.bucket, &key, prepared.content_type, prepared.bytes)
            .await?;

        let result = UploadResult {
            content_identifier,
            key,
            byte_length: prepared.byte_length,
        };
        info!(
            bucket = %self.bucket,
            key = %result.key,
            bytes = result.byte_length,
            etag = %result.content_identifier,
            "upload complete"
        );

        Ok(result)
    }
}
