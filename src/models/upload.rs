//! Per-request upload values.

use bytes::Bytes;

/// A file received from a client, before any validation.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Filename as sent by the client.
    pub original_filename: String,

    /// Full payload, buffered in memory.
    pub bytes: Bytes,
}

impl UploadRequest {
    pub fn new(original_filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            original_filename: original_filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// A validated upload with its derived object name and content type.
#[derive(Clone, Debug)]
pub struct PreparedUpload {
    /// `{epochSeconds}-{filename}`; the key prefix is applied later.
    pub object_name: String,

    /// Extension after the last `.`, as written by the client.
    pub extension: String,

    pub content_type: &'static str,

    pub bytes: Bytes,

    pub byte_length: usize,
}

/// Outcome of a successful upload.
#[derive(Clone, Debug)]
pub struct UploadResult {
    /// Entity tag assigned by the storage backend.
    pub content_identifier: String,

    /// Full object key inside the bucket.
    pub key: String,

    pub byte_length: usize,
}
