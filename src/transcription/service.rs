//! # Transcription Service
//!
//! Owns the one [`Recognizer`] instance and runs requests through it one at a
//! time.
//!
//! ## Exclusivity:
//! The engine is behind a `tokio::sync::Mutex`, which hands the lock out in
//! FIFO order. A request holds the lock only while the engine decodes and its
//! output is copied out; WAV decoding, temp-file I/O and JSON encoding run
//! outside it, fully concurrently.
//!
//! ## Limitations:
//! There is no timeout and no cancellation. An inference call that never
//! returns blocks every later request.

use crate::audio::AudioBuffer;
use crate::transcription::recognizer::{InferenceParams, Recognizer};
use crate::transcription::result::{RawSegment, TranscriptionResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    /// The model never finished loading.
    #[error("Transcription engine is not initialized")]
    NotReady,

    /// The engine reported an error for this input; the message goes to the
    /// client as is.
    #[error("{0}")]
    Failure(String),
}

/// Point-in-time counters for the metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceStats {
    /// Requests waiting for the engine plus the one using it
    pub queue_depth: usize,
    pub completed: u64,
    pub failed: u64,
    pub total_inference_ms: u64,
}

impl ServiceStats {
    pub fn average_inference_ms(&self) -> f64 {
        if self.completed > 0 {
            self.total_inference_ms as f64 / self.completed as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    queue_depth: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    total_inference_ms: AtomicU64,
}

/// Keeps `queue_depth` right even if the request future is dropped while
/// waiting for the lock.
struct QueueSlot<'a>(&'a AtomicUsize);

impl<'a> QueueSlot<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self(depth)
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct TranscriptionService {
    recognizer: Arc<Mutex<Box<dyn Recognizer>>>,
    params: InferenceParams,
    counters: Counters,
}

impl TranscriptionService {
    pub fn new(recognizer: Box<dyn Recognizer>, params: InferenceParams) -> Self {
        Self {
            recognizer: Arc::new(Mutex::new(recognizer)),
            params,
            counters: Counters::default(),
        }
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    /// Transcribe one buffer.
    ///
    /// ## Process:
    /// 1. Wait for exclusive access to the engine (FIFO)
    /// 2. On a blocking thread: check readiness, run inference, copy segments
    ///    and token probabilities out, release the engine
    /// 3. Clean texts and compute confidences outside the lock
    pub async fn transcribe(&self, audio: AudioBuffer) -> Result<TranscriptionResult, TranscriptionError> {
        let _slot = QueueSlot::enter(&self.counters.queue_depth);
        let sample_count = audio.len();

        let guard = Arc::clone(&self.recognizer).lock_owned().await;
        let params = self.params.clone();
        let started = Instant::now();

        let outcome = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            run_exclusive(&mut **guard, audio.samples(), &params)
        })
        .await
        .unwrap_or_else(|e| Err(TranscriptionError::Failure(format!("inference task aborted: {}", e))));

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(raw) => {
                let result = TranscriptionResult::from_raw(&raw);
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.counters.total_inference_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
                tracing::info!(
                    samples = sample_count,
                    segments = raw.len(),
                    retained = result.segments.len(),
                    confidence = result.overall_confidence,
                    inference_ms = elapsed_ms,
                    "Transcription completed"
                );
                Ok(result)
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(samples = sample_count, error = %e, "Transcription failed");
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            queue_depth: self.counters.queue_depth.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            total_inference_ms: self.counters.total_inference_ms.load(Ordering::Relaxed),
        }
    }
}

/// Everything that must happen while the engine is held.
fn run_exclusive(
    recognizer: &mut dyn Recognizer,
    samples: &[f32],
    params: &InferenceParams,
) -> Result<Vec<RawSegment>, TranscriptionError> {
    if !recognizer.is_ready() {
        return Err(TranscriptionError::NotReady);
    }

    recognizer
        .run_inference(samples, params)
        .map_err(TranscriptionError::Failure)?;

    let segments = (0..recognizer.segment_count())
        .map(|i| RawSegment {
            text: recognizer.segment_text(i),
            token_probs: (0..recognizer.token_count(i))
                .map(|j| recognizer.token_probability(i, j))
                .collect(),
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::recognizer::testing::{ScriptedSegment, StubRecognizer};
    use std::time::Duration;

    fn audio() -> AudioBuffer {
        AudioBuffer::from_samples(vec![0.1; 1600]).unwrap()
    }

    #[tokio::test]
    async fn test_transcribe_assembles_result() {
        let stub = StubRecognizer::new(vec![
            ScriptedSegment::new("  hi  ", &[0.9, 0.7]),
            ScriptedSegment::new(" \n", &[0.2]),
        ]);
        let probe = Arc::clone(&stub.probe);
        let service = TranscriptionService::new(Box::new(stub), InferenceParams::default());

        let result = service.transcribe(audio()).await.unwrap();

        assert_eq!(result.text, "hi");
        assert_eq!(result.segments.len(), 1);
        assert!((result.segments[0].confidence - 0.8).abs() < 1e-6);
        assert!((result.overall_confidence - 0.6).abs() < 1e-6);

        let params = probe.last_params.lock().unwrap().clone().unwrap();
        assert_eq!(params.language, "ru");
        assert_eq!(service.stats().completed, 1);
        assert_eq!(service.stats().queue_depth, 0);
    }

    #[tokio::test]
    async fn test_not_ready() {
        let service = TranscriptionService::new(Box::new(StubRecognizer::not_ready()), InferenceParams::default());
        let err = service.transcribe(audio()).await.unwrap_err();
        assert_eq!(err, TranscriptionError::NotReady);
        assert_eq!(service.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_engine_failure() {
        let service = TranscriptionService::new(
            Box::new(StubRecognizer::failing("Whisper processing failed")),
            InferenceParams::default(),
        );
        let err = service.transcribe(audio()).await.unwrap_err();
        assert_eq!(err, TranscriptionError::Failure("Whisper processing failed".to_string()));
        assert_eq!(err.to_string(), "Whisper processing failed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_overlap() {
        let stub = StubRecognizer::new(vec![ScriptedSegment::new("ok", &[1.0])])
            .with_delay(Duration::from_millis(20));
        let probe = Arc::clone(&stub.probe);
        let service = Arc::new(TranscriptionService::new(Box::new(stub), InferenceParams::default()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.transcribe(audio()).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(probe.calls.load(Ordering::SeqCst), 8);
        assert_eq!(probe.reentrant_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.stats().completed, 8);
        assert_eq!(service.stats().queue_depth, 0);
    }
}
