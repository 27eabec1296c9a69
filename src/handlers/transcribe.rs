//! # File Transcription Handler
//!
//! `POST /file` takes a raw WAV upload and returns the transcript.
//!
//! ## Request Flow:
//! 1. Reject an empty body (400) or an unsupported Content-Type (415)
//! 2. Write the body to a uniquely named temp file
//! 3. Read it back, validate and decode the WAV data
//! 4. Transcribe through the shared [`TranscriptionService`]
//! 5. Remove the temp file, whatever happened in 3-4
//! 6. Encode the result or the error as JSON
//!
//! Every failure after step 1 is reported as a JSON error body, never as a
//! crashed worker.

use crate::audio::WavDecoder;
use crate::codec;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::transcription::{TranscriptionResult, TranscriptionService};
use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Content types accepted besides `audio/*`. Form-urlencoded is what
/// `curl --data-binary` sends by default.
const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "application/x-www-form-urlencoded"];

/// Orchestrates one upload from raw bytes to JSON.
#[derive(Clone)]
pub struct FileHandler {
    service: Arc<TranscriptionService>,
    temp_dir: PathBuf,
}

impl FileHandler {
    pub fn new(service: Arc<TranscriptionService>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn service(&self) -> &TranscriptionService {
        &self.service
    }

    /// Run the whole pipeline and produce the status and JSON body to send.
    pub async fn handle_file(&self, body: &[u8], content_type: &str) -> (StatusCode, String) {
        match self.process(body, content_type).await {
            Ok(result) => (StatusCode::OK, codec::encode_success(&result)),
            Err(e) => {
                tracing::warn!(
                    status = e.status_code().as_u16(),
                    content_type = %content_type,
                    bytes = body.len(),
                    error = %e,
                    "File request rejected"
                );
                (e.status_code(), e.to_json())
            }
        }
    }

    pub fn handle_health(&self) -> (StatusCode, String) {
        (StatusCode::OK, codec::encode_health())
    }

    async fn process(&self, body: &[u8], content_type: &str) -> AppResult<TranscriptionResult> {
        if body.is_empty() {
            return Err(AppError::NoFileUploaded);
        }
        if !is_supported_content_type(content_type) {
            return Err(AppError::UnsupportedMediaType(content_type.to_string()));
        }

        let artifact = TempArtifact::create(&self.temp_dir, body).await?;
        let outcome = self.decode_and_transcribe(artifact.path()).await;
        artifact.remove().await;
        outcome
    }

    async fn decode_and_transcribe(&self, path: &Path) -> AppResult<TranscriptionResult> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::io(format!("Cannot open WAV file: {}", path.display()), e))?;

        let audio = WavDecoder::decode(&bytes)?;
        tracing::debug!(
            samples = audio.len(),
            duration_s = audio.duration_seconds(),
            "Decoded WAV upload"
        );

        Ok(self.service.transcribe(audio).await?)
    }
}

/// `audio/*`, or one of [`ACCEPTED_CONTENT_TYPES`]. Parameters such as
/// `; charset=...` are ignored.
pub fn is_supported_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("audio/") || ACCEPTED_CONTENT_TYPES.contains(&mime.as_str())
}

/// An upload materialized on disk for the lifetime of one request.
///
/// Removed explicitly once processing finishes; dropping it without that
/// (e.g. the request future was cancelled) removes the file as well.
struct TempArtifact {
    path: PathBuf,
    removed: bool,
}

impl TempArtifact {
    async fn create(dir: &Path, body: &[u8]) -> AppResult<Self> {
        let digest = format!("{:x}", Sha256::digest(body));
        let name = format!("tmp_audio_{}_{}.wav", &digest[..16], Uuid::new_v4().simple());
        let artifact = Self {
            path: dir.join(name),
            removed: false,
        };

        tokio::fs::write(&artifact.path, body).await.map_err(|e| {
            AppError::io(format!("Cannot create temporary file: {}", artifact.path.display()), e)
        })?;

        Ok(artifact)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Deletion failures are logged and otherwise ignored.
    async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete temporary file");
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete temporary file");
            }
        }
    }
}

/// `POST /file`
pub async fn transcribe_file(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (status, json) = state.files.handle_file(&body, content_type).await;
    HttpResponse::build(status).insert_header(ContentType::json()).body(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::tests::wav_bytes;
    use crate::config::AppConfig;
    use crate::handlers::configure_routes;
    use crate::transcription::recognizer::testing::{ScriptedSegment, StubRecognizer};
    use crate::transcription::recognizer::Recognizer;
    use crate::transcription::InferenceParams;
    use actix_web::{test, App};

    fn app_state(recognizer: impl Recognizer + 'static, temp_dir: &Path) -> web::Data<AppState> {
        let service = Arc::new(TranscriptionService::new(Box::new(recognizer), InferenceParams::default()));
        web::Data::new(AppState::new(AppConfig::default(), FileHandler::new(service, temp_dir)))
    }

    fn speech_stub() -> StubRecognizer {
        StubRecognizer::new(vec![
            ScriptedSegment::new(" Привет", &[0.9, 0.8]),
            ScriptedSegment::new("  ", &[0.1]),
            ScriptedSegment::new(" \"мир\"\n", &[0.6]),
        ])
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn valid_wav() -> Vec<u8> {
        wav_bytes(16000, 1, 16, &[0, 1000, -1000, 2000, -2000, 0])
    }

    #[actix_web::test]
    async fn test_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(speech_stub(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/file")
            .insert_header((header::CONTENT_TYPE, "audio/wav"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], br#"{"error": "No file uploaded"}"#);
    }

    #[actix_web::test]
    async fn test_unsupported_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(speech_stub(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/file")
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .set_payload(valid_wav())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], crate::error::UNSUPPORTED_MEDIA_TYPE_MESSAGE);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_successful_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(speech_stub(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/file")
            .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
            .set_payload(valid_wav())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["text"], "Привет   \"мир\"");
        let segments = body["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0]["id"], 0);
        assert_eq!(segments[0]["text"], "Привет");
        assert_eq!(segments[1]["id"], 1);
        assert_eq!(segments[1]["text"], "\"мир\"");
        let overall = body["confidence"].as_f64().unwrap();
        assert!((overall - 0.6).abs() < 1e-5);

        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_invalid_wav_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(speech_stub(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/file")
            .insert_header((header::CONTENT_TYPE, "audio/x-wav"))
            .set_payload(wav_bytes(16000, 2, 16, &[1, 2, 3, 4]))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "Invalid audio format: Must be Mono (1 channel), found 2 channels."
        );
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_engine_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(StubRecognizer::not_ready(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/file")
            .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
            .set_payload(valid_wav())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], br#"{"error": "Transcription engine is not initialized"}"#);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_engine_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(StubRecognizer::failing("Whisper processing failed"), dir.path());

        let (status, body) = state.files.handle_file(&valid_wav(), "audio/wav").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error": "Whisper processing failed"}"#);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_unwritable_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let state = app_state(speech_stub(), &missing);

        let (status, body) = state.files.handle_file(&valid_wav(), "audio/wav").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with(r#"{"error": "Cannot create temporary file: "#));
        assert!(!missing.exists());
    }

    #[actix_web::test]
    async fn test_concurrent_uploads_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubRecognizer::new(vec![ScriptedSegment::new(" ok", &[0.5])])
            .with_delay(std::time::Duration::from_millis(20));
        let probe = Arc::clone(&stub.probe);
        let app = test::init_service(
            App::new()
                .app_data(app_state(stub, dir.path()))
                .configure(configure_routes),
        )
        .await;

        let requests = (0..6).map(|_| {
            let req = test::TestRequest::post()
                .uri("/file")
                .insert_header((header::CONTENT_TYPE, "audio/wav"))
                .set_payload(valid_wav())
                .to_request();
            test::call_service(&app, req)
        });
        let responses = futures_util::future::join_all(requests).await;

        for resp in responses {
            assert_eq!(resp.status(), StatusCode::OK);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["text"], "ok");
        }
        assert_eq!(probe.calls.load(std::sync::atomic::Ordering::SeqCst), 6);
        assert_eq!(probe.reentrant_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(StubRecognizer::not_ready(), dir.path()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], br#"{"status": "ok"}"#);
    }
}
