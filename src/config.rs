use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub bucket: String,
    pub key_path_one: String,
    pub key_path_two: String,
    pub key_path_three: String,
    pub bucket_ready_timeout: Duration,
    pub bucket_poll_interval: Duration,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload gateway for S3-compatible storage")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// S3 region (overrides AWS_S3_REGION_NAME)
    #[arg(long)]
    pub region: Option<String>,

    /// Access key id (overrides AWS_S3_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Secret access key (overrides AWS_S3_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Custom S3-compatible endpoint (overrides AWS_S3_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Target bucket (overrides AWS_S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Key prefix for uploaded objects (overrides AWS_S3_KEY_PATH_ONE)
    #[arg(long)]
    pub key_path_one: Option<String>,

    /// Secondary key prefix (overrides AWS_S3_KEY_PATH_TWO)
    #[arg(long)]
    pub key_path_two: Option<String>,

    /// Tertiary key prefix (overrides AWS_S3_KEY_PATH_THREE)
    #[arg(long)]
    pub key_path_three: Option<String>,

    /// Seconds to wait for a newly created bucket (overrides UPLOAD_GATEWAY_BUCKET_READY_TIMEOUT_SECS)
    #[arg(long)]
    pub bucket_ready_timeout_secs: Option<u64>,

    /// Delay between bucket readiness checks (overrides UPLOAD_GATEWAY_BUCKET_POLL_INTERVAL_MS)
    #[arg(long)]
    pub bucket_poll_interval_ms: Option<u64>,

    /// Maximum accepted request body (overrides UPLOAD_GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse(), |name| env::var(name))
    }

    /// Merge parsed CLI args over values read through `lookup`.
    pub fn from_args<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let text = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) if value.trim().is_empty() => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        let bucket = match args.bucket.or(text("AWS_S3_BUCKET_NAME")?) {
            Some(bucket) => bucket,
            None => bail!("no bucket configured; set AWS_S3_BUCKET_NAME or pass --bucket"),
        };

        let env_port = parse_env(&text, "UPLOAD_GATEWAY_PORT")?.unwrap_or(8080);
        let env_timeout =
            parse_env(&text, "UPLOAD_GATEWAY_BUCKET_READY_TIMEOUT_SECS")?.unwrap_or(30);
        let env_poll_ms =
            parse_env(&text, "UPLOAD_GATEWAY_BUCKET_POLL_INTERVAL_MS")?.unwrap_or(1000);
        let env_max_upload =
            parse_env(&text, "UPLOAD_GATEWAY_MAX_UPLOAD_BYTES")?.unwrap_or(10 * 1024 * 1024);

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .or(text("UPLOAD_GATEWAY_HOST")?)
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            region: args
                .region
                .or(text("AWS_S3_REGION_NAME")?)
                .unwrap_or_else(|| "us-east-1".into()),
            access_key_id: args.access_key_id.or(text("AWS_S3_ACCESS_KEY_ID")?),
            secret_access_key: args
                .secret_access_key
                .or(text("AWS_S3_SECRET_ACCESS_KEY")?),
            endpoint_url: args.endpoint_url.or(text("AWS_S3_ENDPOINT_URL")?),
            bucket,
            key_path_one: args
                .key_path_one
                .or(text("AWS_S3_KEY_PATH_ONE")?)
                .unwrap_or_else(|| "uploads".into()),
            key_path_two: args
                .key_path_two
                .or(text("AWS_S3_KEY_PATH_TWO")?)
                .unwrap_or_default(),
            key_path_three: args
                .key_path_three
                .or(text("AWS_S3_KEY_PATH_THREE")?)
                .unwrap_or_default(),
            bucket_ready_timeout: Duration::from_secs(
                args.bucket_ready_timeout_secs.unwrap_or(env_timeout),
            ),
            bucket_poll_interval: Duration::from_millis(
                args.bucket_poll_interval_ms.unwrap_or(env_poll_ms),
            ),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T, F>(text: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<Option<String>>,
{
    text(name)?
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "***"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket", &self.bucket)
            .field("key_path_one", &self.key_path_one)
            .field("key_path_two", &self.key_path_two)
            .field("key_path_three", &self.key_path_three)
            .field("bucket_ready_timeout", &self.bucket_ready_timeout)
            .field("bucket_poll_interval", &self.bucket_poll_interval)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
