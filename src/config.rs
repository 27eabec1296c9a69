//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml, or the file passed with `--config`)
//! - Environment variables (with APP_ prefix, plus HOST and PORT)
//! - Command-line flags (`--model`, `--port`, `--gpu-layers`, `--host`)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Command-line flags
//! 2. HOST / PORT environment variables
//! 3. APP_ environment variables (APP_SERVER__PORT, APP_MODEL__PATH, ...)
//! 4. Configuration file
//! 5. Default values (defined in the Default impl)

use crate::transcription::recognizer::default_threads;
use crate::transcription::InferenceParams;
use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Command-line flags.
#[derive(Parser, Debug, Default)]
#[command(name = "wav-transcribe-server", version, about = "Speech-to-text over HTTP for 16kHz mono WAV files")]
pub struct Cli {
    /// Path to the GGML model file.
    #[arg(long)]
    pub model: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Model layers to offload to the GPU (0 = CPU only).
    #[arg(long = "gpu-layers")]
    pub gpu_layers: Option<u32>,

    /// Address to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// Configuration file (default: ./config.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
}

/// HTTP listener settings.
///
/// ## Fields:
/// - `host`: Address to bind ("0.0.0.0" accepts connections from anywhere)
/// - `port`: TCP port
/// - `workers`: HTTP worker threads, 0 = one per core
/// - `max_payload_mb`: Largest accepted upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub max_payload_mb: usize,
}

/// Speech model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub gpu_layers: u32,
    /// Language hint passed on every inference call
    pub language: String,
    /// Inference threads per call
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where uploads are materialized while being decoded
    pub temp_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 9090,
                workers: 0,
                max_payload_mb: 50,
            },
            model: ModelConfig {
                path: "models/ggml-large-v3-turbo.bin".to_string(),
                gpu_layers: 0,
                language: "ru".to_string(),
                threads: default_threads(),
            },
            storage: StorageConfig {
                temp_dir: env::temp_dir().display().to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from every source in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_MODEL__GPU_LAYERS=20`: Override GPU offload
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => config::File::from(path.as_path()).required(true),
            None => config::File::with_name("config").required(false),
        };

        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file)
            // Sections are split on a double underscore so field names may contain one.
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let mut config: AppConfig = settings.build()?.try_deserialize()?;
        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(model) = &cli.model {
            self.model.path = model.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(gpu_layers) = cli.gpu_layers {
            self.model.gpu_layers = gpu_layers;
        }
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.max_payload_mb == 0 {
            return Err(anyhow::anyhow!("Max payload size must be greater than 0"));
        }

        if self.model.path.trim().is_empty() {
            return Err(anyhow::anyhow!("Model path cannot be empty"));
        }

        if self.model.language.trim().is_empty() {
            return Err(anyhow::anyhow!("Model language cannot be empty"));
        }

        if self.model.threads == 0 {
            return Err(anyhow::anyhow!("Inference threads must be greater than 0"));
        }

        if self.storage.temp_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Temp directory cannot be empty"));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.server.max_payload_mb * 1024 * 1024
    }

    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            language: self.model.language.clone(),
            threads: self.model.threads,
            ..InferenceParams::default()
        }
    }
}
