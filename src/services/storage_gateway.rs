//! src/services/storage_gateway.rs
//!
//! StorageGateway: the only place that talks to object storage. It owns the
//! bucket bootstrap (existence check, create, bounded readiness wait) and the
//! single-shot put that yields the entity tag. The backend itself sits behind
//! the [`ObjectStore`] trait so the S3 client can be swapped for a test double.

use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
        retryable: bool,
    },
    #[error("bucket `{bucket}` was not ready after {waited:?}")]
    BucketNotReady { bucket: String, waited: Duration },
    #[error("storage returned no entity tag for `{key}`")]
    MissingEntityTag { key: String },
}

impl StorageError {
    /// Whether the same request may succeed if the client tries again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Backend { retryable, .. } => *retryable,
            StorageError::BucketNotReady { .. } => true,
            StorageError::MissingEntityTag { .. } => false,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal object-storage surface the gateway needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// HEAD the bucket. `Ok(false)` means it does not exist.
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Issue a create. Must succeed if the bucket already belongs to us.
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Store the full payload under `key`, returning the backend's entity tag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> StorageResult<Option<String>>;
}

/// Default delay between readiness checks after a bucket create.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn ObjectStore>, ready_timeout: Duration) -> Self {
        Self {
            store,
            ready_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Existence check, used by readiness.
    pub async fn check_bucket(&self, bucket: &str) -> StorageResult<bool> {
        self.store.bucket_exists(bucket).await
    }

    /// Make sure `bucket` exists, creating it and waiting for it if needed.
    ///
    /// Idempotent. The wait is bounded by `ready_timeout`; exceeding it yields
    /// [`StorageError::BucketNotReady`].
    pub async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        if self.store.bucket_exists(bucket).await? {
            debug!(bucket, "bucket exists");
            return Ok(());
        }

        info!(bucket, "bucket missing, creating");
        self.store.create_bucket(bucket).await?;
        self.wait_until_ready(bucket).await?;
        info!(bucket, "bucket is ready");
        Ok(())
    }

    async fn wait_until_ready(&self, bucket: &str) -> StorageResult<()> {
        let poll = async {
            loop {
                match self.store.bucket_exists(bucket).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => debug!(bucket, "bucket not visible yet"),
                    Err(err) if err.is_retryable() => {
                        debug!(bucket, error = %err, "transient error while waiting for bucket")
                    }
                    Err(err) => return Err(err),
                }
                sleep(self.poll_interval).await;
            }
        };

        match timeout(self.ready_timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!(bucket, waited = ?self.ready_timeout, "gave up waiting for bucket");
                Err(StorageError::BucketNotReady {
                    bucket: bucket.to_string(),
                    waited: self.ready_timeout,
                })
            }
        }
    }

    /// Put `bytes` under `key` and return the entity tag.
    ///
    /// An absent or blank tag is an error, never an empty success.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> StorageResult<String> {
        let length = bytes.len();
        let etag = self
            .store
            .put_object(bucket, key, content_type, bytes)
            .await?;

        match etag.filter(|tag| !tag.trim().is_empty()) {
            Some(tag) => {
                debug!(bucket, key, length, etag = %tag, "object stored");
                Ok(tag)
            }
            None => Err(StorageError::MissingEntityTag {
                key: key.to_string(),
            }),
        }
    }
}
