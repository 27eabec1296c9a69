//! # whisper.cpp Recognizer
//!
//! [`Recognizer`] backed by `whisper-rs`. Only compiled with the `whisper`
//! cargo feature, since building whisper.cpp needs a C++ toolchain.

use crate::config::ModelConfig;
use crate::transcription::recognizer::{DecodingStrategy, InferenceParams, Recognizer};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

/// Output of the last inference call, copied out of whisper's state so the
/// accessors cannot fail.
#[derive(Debug, Default)]
struct DecodedSegment {
    text: String,
    token_probs: Vec<f32>,
}

pub struct WhisperRecognizer {
    // Keeps the model weights alive for `state`.
    _context: WhisperContext,
    state: WhisperState,
    output: Vec<DecodedSegment>,
}

impl WhisperRecognizer {
    /// Load a GGML model file. `gpu_layers > 0` turns on GPU offload.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        if !path.exists() {
            return Err(anyhow!("Model file not found: {}", path.display()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {}", path.display()))?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(config.gpu_layers > 0);

        let context = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| anyhow!("{:?}", e))
            .with_context(|| format!("Failed to load model: {}", config.path))?;
        let state = context
            .create_state()
            .map_err(|e| anyhow!("{:?}", e))
            .context("Failed to create whisper decode state")?;

        Ok(Self {
            _context: context,
            state,
            output: Vec::new(),
        })
    }

    fn collect_output(&mut self) -> Result<(), whisper_rs::WhisperError> {
        let n_segments = self.state.full_n_segments()?;
        let mut output = Vec::with_capacity(n_segments.max(0) as usize);

        for i in 0..n_segments {
            let text = self.state.full_get_segment_text(i)?;
            let n_tokens = self.state.full_n_tokens(i)?;
            let mut token_probs = Vec::with_capacity(n_tokens.max(0) as usize);
            for j in 0..n_tokens {
                token_probs.push(self.state.full_get_token_prob(i, j)?);
            }
            output.push(DecodedSegment { text, token_probs });
        }

        self.output = output;
        Ok(())
    }
}

impl Recognizer for WhisperRecognizer {
    fn is_ready(&self) -> bool {
        true
    }

    fn run_inference(&mut self, samples: &[f32], params: &InferenceParams) -> Result<(), String> {
        let strategy = match params.strategy {
            DecodingStrategy::Greedy => SamplingStrategy::Greedy { best_of: 1 },
        };
        let mut full_params = FullParams::new(strategy);
        full_params.set_language(Some(params.language.as_str()));
        full_params.set_n_threads(params.threads as i32);
        full_params.set_print_progress(false);
        full_params.set_print_special(false);
        full_params.set_print_realtime(false);
        full_params.set_print_timestamps(false);

        self.output.clear();
        self.state.full(full_params, samples).map_err(|e| {
            tracing::error!(error = %e, "whisper_full returned an error");
            "Whisper processing failed".to_string()
        })?;
        self.collect_output().map_err(|e| {
            tracing::error!(error = %e, "Cannot read segments from whisper state");
            "Failed to read whisper output".to_string()
        })
    }

    fn segment_count(&self) -> usize {
        self.output.len()
    }

    fn segment_text(&self, segment: usize) -> String {
        self.output[segment].text.clone()
    }

    fn token_count(&self, segment: usize) -> usize {
        self.output[segment].token_probs.len()
    }

    fn token_probability(&self, segment: usize, token: usize) -> f32 {
        self.output[segment].token_probs[token]
    }
}
