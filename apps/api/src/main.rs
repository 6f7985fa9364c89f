mod auth;
mod config;
mod errors;
mod inference;
mod kv;
mod models;
mod raster;
mod routes;
mod state;
mod storage;
mod workflow;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::StaticTokenAuthenticator;
use crate::config::Config;
use crate::inference::{anthropic, AnthropicInference};
use crate::kv::RedisStore;
use crate::raster::PdfiumRasterizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3Storage;
use crate::workflow::jobs::JobRegistry;
use crate::workflow::orchestrator::UploadWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumatch v{}", env!("CARGO_PKG_VERSION"));

    // Redis key-value store
    let redis = redis::Client::open(config.redis_url.clone())?;
    let store = Arc::new(RedisStore::new(redis));
    info!("Redis client initialized");

    // S3 / MinIO file storage
    let s3 = build_s3_client(&config).await;
    let storage = Arc::new(S3Storage::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // pdfium rasterizer
    let rasterizer = Arc::new(PdfiumRasterizer::new(
        config.pdfium_library_path.as_ref().map(PathBuf::from),
        config.raster_max_pixels,
    ));

    // LLM-backed inference
    let inference = Arc::new(AnthropicInference::new(
        config.anthropic_api_key.clone(),
        storage.clone(),
    )?);
    info!("Inference client initialized (model: {})", anthropic::MODEL);

    let workflow = UploadWorkflow::new(storage, rasterizer, inference, store.clone());
    let shutdown = CancellationToken::new();

    let state = AppState {
        workflow: Arc::new(workflow),
        store,
        auth: Arc::new(StaticTokenAuthenticator::new(config.auth_tokens.clone())),
        jobs: JobRegistry::default(),
        shutdown: shutdown.clone(),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl-C, then cancels every in-flight upload job.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cancelling in-flight uploads");
    shutdown.cancel();
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resumatch-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
