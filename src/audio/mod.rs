//! # Audio Ingestion Module
//!
//! Converts uploaded WAV bytes into samples the transcription engine accepts.
//!
//! ## Key Components:
//! - **Audio Buffer**: Non-empty normalized sample sequence (16kHz, mono)
//! - **WAV Decoder**: Fixed-offset header validation and PCM conversion
//!
//! ## Audio Format Requirements:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers

pub mod buffer;  // Normalized sample container
pub mod wav;     // WAV header validation and decoding

pub use buffer::AudioBuffer;
pub use wav::{WavDecoder, WavError};
