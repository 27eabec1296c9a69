//! # Response Codec
//!
//! Renders the three JSON bodies this service emits. The layout, including
//! the space after each colon and comma, is fixed for wire compatibility with
//! existing clients, so the object layout is written by hand. String values
//! are escaped by serde_json.
//!
//! ## Shapes:
//! ```json
//! {"text": "...", "segments": [{"id": 0, "text": "...", "confidence": 0.9}], "confidence": 0.9}
//! {"error": "..."}
//! {"status": "ok"}
//! ```

use crate::transcription::TranscriptionResult;
use serde_json::Value;

pub const HEALTH_BODY: &str = r#"{"status": "ok"}"#;

/// Escape a string for inclusion between JSON double quotes.
///
/// Only `"` and `\` and control characters 0x00-0x1F are escaped. Non-ASCII
/// text and `/` pass through untouched.
pub fn escape_json(s: &str) -> String {
    let literal = Value::from(s).to_string();
    literal[1..literal.len() - 1].to_string()
}

/// Non-finite values have no JSON form; they are reported as 0.
fn format_confidence(value: f32) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "0".to_string()
    }
}

pub fn encode_success(result: &TranscriptionResult) -> String {
    let segments: Vec<String> = result
        .segments
        .iter()
        .enumerate()
        .map(|(id, segment)| {
            format!(
                "{{\"id\": {}, \"text\": \"{}\", \"confidence\": {}}}",
                id,
                escape_json(&segment.text),
                format_confidence(segment.confidence)
            )
        })
        .collect();

    format!(
        "{{\"text\": \"{}\", \"segments\": [{}], \"confidence\": {}}}",
        escape_json(&result.text),
        segments.join(", "),
        format_confidence(result.overall_confidence)
    )
}

pub fn encode_error(message: &str) -> String {
    format!("{{\"error\": \"{}\"}}", escape_json(message))
}

pub fn encode_health() -> String {
    HEALTH_BODY.to_string()
}
