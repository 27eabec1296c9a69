//! # Error Handling
//!
//! Request-level error type and its mapping onto HTTP responses.
//!
//! ## Error Categories:
//! - **NoFileUploaded**: Empty request body (400)
//! - **UnsupportedMediaType**: Content-Type is not audio/*, octet-stream or
//!   form-urlencoded (415)
//! - **Format**: The upload is not a 16kHz mono 16-bit WAV file (400)
//! - **Transcription**: Engine not loaded or inference failed (400)
//! - **Io**: Temporary file could not be created, written or read (400)
//!
//! Engine failures arguably deserve a 500. They are reported as 400 because
//! existing clients expect that; see DESIGN.md.
//!
//! ## JSON Response Format:
//! ```json
//! {"error": "Invalid audio format: Must be Mono (1 channel), found 2 channels."}
//! ```

use crate::audio::WavError;
use crate::codec;
use crate::transcription::TranscriptionError;
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub const UNSUPPORTED_MEDIA_TYPE_MESSAGE: &str =
    "Unsupported Content-Type. Please use audio/* or application/octet-stream.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file uploaded")]
    NoFileUploaded,

    /// Holds the rejected Content-Type for logging; the client sees the fixed message.
    #[error("{}", UNSUPPORTED_MEDIA_TYPE_MESSAGE)]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Format(#[from] WavError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }

    /// The `{"error": ...}` body for this error.
    pub fn to_json(&self) -> String {
        codec::encode_error(&self.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,  // 415
            AppError::NoFileUploaded
            | AppError::Format(_)
            | AppError::Transcription(_)
            | AppError::Io { .. } => StatusCode::BAD_REQUEST,  // 400
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(self.to_json())
    }
}

pub type AppResult<T> = Result<T, AppError>;
