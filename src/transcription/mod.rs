//! # Transcription Module
//!
//! Wraps the speech recognition engine and turns its output into scored,
//! cleaned transcripts.
//!
//! ## Key Components:
//! - **Recognizer**: Contract for the external, non-reentrant engine
//! - **Transcription Service**: Single-flight access to the engine
//! - **Results**: Text cleaning and confidence scoring
//! - **Whisper backend**: whisper.cpp bindings (`whisper` feature)

pub mod recognizer;  // Engine contract and inference parameters
pub mod result;      // Raw output -> client-facing result
pub mod service;     // Mutex-guarded engine access
#[cfg(feature = "whisper")]
pub mod whisper;     // whisper-rs backed recognizer

pub use recognizer::{InferenceParams, Recognizer};
pub use result::TranscriptionResult;
pub use service::{TranscriptionError, TranscriptionService};

use crate::config::ModelConfig;

/// Build the recognizer for this binary.
///
/// With the `whisper` feature a model that fails to load aborts startup.
/// Without it the server runs with an engine that is never ready.
pub fn load_recognizer(config: &ModelConfig) -> anyhow::Result<Box<dyn Recognizer>> {
    #[cfg(feature = "whisper")]
    {
        tracing::info!("Loading whisper model from {}", config.path);
        let recognizer = whisper::WhisperRecognizer::load(config)?;
        tracing::info!("Model loaded successfully");
        Ok(Box::new(recognizer))
    }

    #[cfg(not(feature = "whisper"))]
    {
        tracing::warn!(
            model = %config.path,
            "Built without the `whisper` feature; transcription requests will fail until rebuilt"
        );
        Ok(Box::new(recognizer::UnloadedRecognizer))
    }
}
