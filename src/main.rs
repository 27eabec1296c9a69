//! # WAV Transcription Server
//!
//! Exposes a speech-to-text model over HTTP. Clients upload a 16kHz mono
//! 16-bit WAV file and get back the transcript, split into segments with
//! confidence scores.
//!
//! ## Application Architecture:
//! - **config**: Defaults, config.toml, environment variables and CLI flags
//! - **audio**: WAV validation and decoding
//! - **transcription**: Recognizer contract and the single-flight service
//! - **codec**: Hand-written JSON bodies with fixed layout
//! - **handlers**: `POST /file` pipeline and route table
//! - **health**: `/health` and `/metrics`
//! - **middleware**: Request logging and metrics
//! - **state**: Shared application state
//! - **error**: Request error type and HTTP mapping

mod audio;
mod codec;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use crate::config::{AppConfig, Cli};
use crate::handlers::FileHandler;
use crate::state::AppState;
use crate::transcription::TranscriptionService;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ## What this function does:
/// 1. **Loads configuration** from files, environment variables and flags
/// 2. **Sets up logging**
/// 3. **Loads the model** and wraps it in the transcription service
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** on SIGINT / SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing()?;

    let config = AppConfig::load(&cli).context("Failed to load configuration")?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Model path: {}", config.model.path);
    info!("Port: {}", config.server.port);
    info!(
        "GPU layers: {} ({})",
        config.model.gpu_layers,
        if config.model.gpu_layers > 0 { "GPU" } else { "CPU" }
    );

    let recognizer = transcription::load_recognizer(&config.model)?;
    let service = Arc::new(TranscriptionService::new(recognizer, config.inference_params()));
    let files = FileHandler::new(service, &config.storage.temp_dir);

    let app_state = AppState::new(config.clone(), files);
    let bind_addr = config.bind_addr();
    let payload_limit = config.max_payload_bytes();

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .disable_signals();

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let server = server
        .bind(&bind_addr)
        .with_context(|| format!("Failed to start server on {}", bind_addr))?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` controls verbosity; defaults to
/// `wav_transcribe_server=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wav_transcribe_server=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn wait_for_shutdown() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
