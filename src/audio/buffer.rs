//! # Audio Buffer
//!
//! Holds the decoded samples of one uploaded file on their way into the
//! transcription engine.
//!
//! ## Format:
//! - **Sample Rate**: 16kHz, implied (the decoder refuses anything else)
//! - **Channels**: Mono
//! - **Range**: Every sample is normalized into [-1.0, 1.0]

/// Sample rate every buffer is implicitly recorded at.
pub const SAMPLE_RATE: u32 = 16_000;

/// Ordered, non-empty sequence of normalized mono samples.
///
/// The only way to build one outside this module is through
/// [`AudioBuffer::from_samples`], which refuses an empty vector, so holders
/// never have to re-check emptiness.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Wrap already-normalized samples. Returns `None` for an empty vector.
    pub fn from_samples(samples: Vec<f32>) -> Option<Self> {
        if samples.is_empty() {
            None
        } else {
            Some(Self { samples })
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Audio length in seconds at [`SAMPLE_RATE`].
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}
