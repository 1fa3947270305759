//! WFS API service.
//!
//! OGC WFS 1.0.0 server exposing farmOS areas as a vector feature type.

use anyhow::{Context, Result};
use axum::{extract::Extension, routing::get};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use farmos_client::{FarmOsClient, FarmOsConfig};
use wfs_api::config::WfsConfig;
use wfs_api::handlers;
use wfs_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "wfs-api")]
#[command(about = "OGC WFS server for farmOS areas")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5707", env = "WFS_LISTEN_ADDR")]
    listen: String,

    /// Base URL of the farmOS instance (default: http://localhost:80)
    #[arg(long, env = "FARMOS_URL")]
    farm_os_url: Option<String>,

    /// Public URL of the WFS endpoint (default: http://localhost:5707/wfs)
    #[arg(long, env = "WFS_PUBLIC_URL")]
    public_url: Option<String>,

    /// Optional YAML configuration file
    #[arg(long, env = "WFS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "WFS_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))
}

fn load_config(args: &Args) -> Result<WfsConfig> {
    let mut config = match &args.config {
        Some(path) => WfsConfig::load(path)?,
        None => WfsConfig::default(),
    };

    if let Some(url) = &args.farm_os_url {
        config.farm_os_url = url.clone();
    }
    if let Some(url) = &args.public_url {
        config.public_url = url.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn async_main(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    let config = load_config(&args)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!(
        farm_os_url = %config.farm_os_url,
        public_url = %config.public_url,
        fetch_concurrency = config.fetch_concurrency,
        "Starting WFS API server"
    );

    let backend = FarmOsClient::new(FarmOsConfig {
        user_agent: config.user_agent.clone(),
        ..FarmOsConfig::new(config.farm_os_url.clone())
    })
    .context("Failed to create farmOS client")?;

    let state = Arc::new(AppState::new(Arc::new(backend), &config));

    let app = wfs_api::router(state)
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
