use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_utils;

use services::{
    s3_store::S3ObjectStore, storage_gateway::StorageGateway, upload_service::UploadService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-upload-gateway with config: {:?}", cfg);
    tracing::debug!(
        key_path_two = %cfg.key_path_two,
        key_path_three = %cfg.key_path_three,
        "secondary key paths loaded but not used for uploads"
    );
    tracing::info!(
        supported = %models::image_type::extensions_to_delimited_string(","),
        "accepting image uploads"
    );

    // --- Initialize storage ---
    let store = S3ObjectStore::from_config(&cfg).await;
    let gateway = StorageGateway::new(Arc::new(store), cfg.bucket_ready_timeout)
        .with_poll_interval(cfg.bucket_poll_interval);
    let service = UploadService::new(gateway, cfg.bucket.clone(), cfg.key_path_one.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
