//! # WAV Decoding and Validation
//!
//! Turns an uploaded canonical WAV file into an [`AudioBuffer`].
//!
//! ## Accepted Format:
//! - **Header**: the standard 44-byte RIFF/WAVE header, PCM data right after it
//! - **Sample Rate**: 16000 Hz (bytes 24..28, u32 little-endian)
//! - **Channels**: 1 (bytes 22..24, u16 little-endian)
//! - **Bit Depth**: 16 (bytes 34..36, u16 little-endian)
//!
//! Fields are read at those fixed offsets; there is no chunk walking. Anything
//! else is rejected with a [`WavError`] naming the offending field and its
//! value. There is no resampling and no channel mixing.

use crate::audio::buffer::{AudioBuffer, SAMPLE_RATE};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// Size of the canonical header; PCM data starts here.
pub const HEADER_LEN: usize = 44;

const CHANNELS_OFFSET: usize = 22;
const SAMPLE_RATE_OFFSET: usize = 24;
const BITS_PER_SAMPLE_OFFSET: usize = 34;

const REQUIRED_CHANNELS: u16 = 1;
const REQUIRED_BITS_PER_SAMPLE: u16 = 16;

/// Reasons an upload is not a usable 16kHz mono 16-bit WAV file.
///
/// The messages are returned to API clients as-is, so each one states what
/// was expected and what was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    #[error("Failed to read full 44-byte WAV header (only {0} bytes available).")]
    TruncatedHeader(usize),

    #[error("Invalid audio format: Sample rate must be 16000 Hz, found {0} Hz.")]
    SampleRate(u32),

    #[error("Invalid audio format: Must be Mono (1 channel), found {0} channels.")]
    Channels(u16),

    #[error("Invalid audio format: Must be 16-bit PCM, found {0} bits.")]
    BitsPerSample(u16),

    #[error("WAV file is empty or corrupted (0 samples read).")]
    Empty,
}

/// Format fields pulled out of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavHeader {
    /// Read the three checked fields at their canonical offsets.
    pub fn parse(bytes: &[u8]) -> Result<Self, WavError> {
        if bytes.len() < HEADER_LEN {
            return Err(WavError::TruncatedHeader(bytes.len()));
        }

        Ok(Self {
            sample_rate: LittleEndian::read_u32(&bytes[SAMPLE_RATE_OFFSET..SAMPLE_RATE_OFFSET + 4]),
            channels: LittleEndian::read_u16(&bytes[CHANNELS_OFFSET..CHANNELS_OFFSET + 2]),
            bits_per_sample: LittleEndian::read_u16(
                &bytes[BITS_PER_SAMPLE_OFFSET..BITS_PER_SAMPLE_OFFSET + 2],
            ),
        })
    }

    /// Checked in the order sample rate, channels, bit depth; the first
    /// mismatch wins.
    pub fn validate(&self) -> Result<(), WavError> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(WavError::SampleRate(self.sample_rate));
        }
        if self.channels != REQUIRED_CHANNELS {
            return Err(WavError::Channels(self.channels));
        }
        if self.bits_per_sample != REQUIRED_BITS_PER_SAMPLE {
            return Err(WavError::BitsPerSample(self.bits_per_sample));
        }
        Ok(())
    }
}

/// Stateless decoder for canonical WAV uploads.
pub struct WavDecoder;

impl WavDecoder {
    /// Validate the header and convert the PCM payload to normalized floats.
    ///
    /// ## Conversion:
    /// Every little-endian i16 after byte 44 is divided by 32768.0, so the
    /// result lies in [-1.0, 1.0). A trailing odd byte is ignored, giving
    /// `(bytes.len() - 44) / 2` samples.
    pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, WavError> {
        let header = WavHeader::parse(bytes)?;
        header.validate()?;

        let pcm = &bytes[HEADER_LEN..];
        let mut samples = Vec::with_capacity(pcm.len() / 2);
        let mut cursor = Cursor::new(pcm);
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            samples.push(sample as f32 / 32768.0);
        }

        AudioBuffer::from_samples(samples).ok_or(WavError::Empty)
    }
}
