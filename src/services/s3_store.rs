//! [`ObjectStore`] backed by `aws-sdk-s3`.
//!
//! Works against AWS and against S3-compatible endpoints (MinIO and friends)
//! when `endpoint_url` is configured, in which case path-style addressing is
//! forced.

use crate::{
    config::AppConfig,
    services::storage_gateway::{ObjectStore, StorageError, StorageResult},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{Region, http::HttpResponse},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{create_bucket::CreateBucketError, head_bucket::HeadBucketError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use tracing::{debug, error};

/// Region in which S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Error codes S3 uses for throttling and transient server trouble.
const RETRYABLE_CODES: [&str; 5] = [
    "SlowDown",
    "Throttling",
    "RequestTimeout",
    "InternalError",
    "ServiceUnavailable",
];

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build a client from application config.
    ///
    /// Static credentials are used when both halves are configured; otherwise
    /// the SDK's default provider chain applies.
    pub async fn from_config(cfg: &AppConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));

        if let (Some(key_id), Some(secret)) = (&cfg.access_key_id, &cfg.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "upload-gateway-config",
            ));
        } else {
            debug!("no static S3 credentials configured, using default provider chain");
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &cfg.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), cfg.region.clone())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        head_bucket_outcome(self.client.head_bucket().bucket(bucket).send().await)
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if !self.region.eq_ignore_ascii_case(DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        create_bucket_outcome(bucket, request.send().await)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> StorageResult<Option<String>> {
        let checksum = general_purpose::STANDARD.encode(md5::compute(&body).0);
        let length = body.len() as i64;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(length)
            .content_md5(checksum)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| backend_error("put_object", err))?;

        Ok(output.e_tag().map(str::to_string))
    }
}

/// HEAD result to existence: a modeled 404 means the bucket is absent.
fn head_bucket_outcome<T>(
    result: Result<T, SdkError<HeadBucketError, HttpResponse>>,
) -> StorageResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|service_err| service_err.is_not_found()) =>
        {
            Ok(false)
        }
        Err(err) => Err(backend_error("head_bucket", err)),
    }
}

/// Create result; a bucket this account already owns counts as created.
fn create_bucket_outcome<T>(
    bucket: &str,
    result: Result<T, SdkError<CreateBucketError, HttpResponse>>,
) -> StorageResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|service_err| service_err.is_bucket_already_owned_by_you()) =>
        {
            debug!(bucket, "bucket already owned by this account");
            Ok(())
        }
        Err(err) => Err(backend_error("create_bucket", err)),
    }
}

/// Convert an SDK failure into a [`StorageError::Backend`] with a retry hint.
fn backend_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            status == 429
                || status >= 500
                || ctx
                    .err()
                    .code()
                    .is_some_and(|code| RETRYABLE_CODES.contains(&code))
        }
        _ => false,
    };

    let message = DisplayErrorContext(&err).to_string();
    error!(operation, retryable, error = %message, "S3 request failed");

    StorageError::Backend {
        operation,
        message,
        retryable,
    }
}
