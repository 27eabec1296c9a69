//! # Recognizer Contract
//!
//! The speech model itself is an external engine. This module only describes
//! what the service needs from it: run inference on a sample buffer, then
//! read back segments and per-token probabilities.
//!
//! ## Thread Safety:
//! Engines keep mutable decode state between `run_inference` and the
//! accessors, so inference takes `&mut self`. The service owns the single
//! instance behind a mutex; nothing else ever touches it.

/// Decoding strategy handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingStrategy {
    /// Single-pass, best candidate per step.
    Greedy,
}

/// Per-call inference settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceParams {
    /// Language hint (ISO 639-1, e.g. "ru")
    pub language: String,

    /// Worker threads the engine may use for one call
    pub threads: usize,

    pub strategy: DecodingStrategy,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            language: "ru".to_string(),
            threads: default_threads(),
            strategy: DecodingStrategy::Greedy,
        }
    }
}

/// min(4, available hardware parallelism).
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(1)
}

/// Non-reentrant speech-to-text engine.
///
/// After a successful [`run_inference`](Recognizer::run_inference) the
/// accessors describe that run's output until the next call. Segment and
/// token indices are zero-based and must be below the matching count.
pub trait Recognizer: Send {
    /// Whether the model finished loading.
    fn is_ready(&self) -> bool;

    /// Run one full decode over `samples`. The error string is the engine's
    /// own description of the failure.
    fn run_inference(&mut self, samples: &[f32], params: &InferenceParams) -> Result<(), String>;

    fn segment_count(&self) -> usize;

    fn segment_text(&self, segment: usize) -> String;

    fn token_count(&self, segment: usize) -> usize;

    fn token_probability(&self, segment: usize, token: usize) -> f32;
}

/// Stand-in used when the binary was built without an inference backend.
/// It never becomes ready, so every request fails with "not initialized".
#[derive(Debug, Default)]
pub struct UnloadedRecognizer;

impl Recognizer for UnloadedRecognizer {
    fn is_ready(&self) -> bool {
        false
    }

    fn run_inference(&mut self, _samples: &[f32], _params: &InferenceParams) -> Result<(), String> {
        Err("no inference backend compiled in".to_string())
    }

    fn segment_count(&self) -> usize {
        0
    }

    fn segment_text(&self, _segment: usize) -> String {
        String::new()
    }

    fn token_count(&self, _segment: usize) -> usize {
        0
    }

    fn token_probability(&self, _segment: usize, _token: usize) -> f32 {
        0.0
    }
}
