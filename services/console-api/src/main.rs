//! Console API service.
//!
//! Control surface for the session engine: runs load tests against the
//! engine HTTP API and streams their telemetry to browsers over SSE.

mod auth;
mod handlers;
mod state;

use anyhow::Result;
use axum::{extract::Extension, routing::get, Router};
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "console-api")]
#[command(about = "Engine console API server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8090")]
    listen: String,

    /// Engine base URL
    #[arg(long, env = "ENGINE_URL", default_value = "http://127.0.0.1:3000")]
    engine_url: String,

    /// Bearer token required on inbound requests (unset leaves the
    /// surface open)
    #[arg(long, env = "CONSOLE_API_TOKEN")]
    api_token: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build tokio runtime with configurable worker threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    } else if let Ok(threads_str) = env::var("TOKIO_WORKER_THREADS") {
        if let Ok(threads) = threads_str.parse::<usize>() {
            runtime_builder.worker_threads(threads);
        }
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting console API server");

    // Initialize application state
    let state = Arc::new(AppState::new(&args.engine_url, args.api_token)?);
    info!(engine_url = %state.engine_url, "Engine endpoint configured");

    // Build router
    let app = Router::new()
        // Load test SSE stream
        .route("/api/loadtest", get(handlers::loadtest_stream_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        // Layer extensions
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
