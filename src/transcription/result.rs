//! # Transcription Results
//!
//! Turns raw engine output into the structure returned to API clients.
//!
//! ## Confidence Scoring:
//! - **Segment confidence**: mean token probability of that segment, 0.0 when
//!   it has no tokens
//! - **Overall confidence**: mean token probability across every segment the
//!   engine produced, including segments dropped because their text trims to
//!   nothing; 0.0 when there are no tokens at all
//!
//! The two are intentionally computed over different segment sets: overall
//! confidence describes the raw model output, segment confidences describe
//! what is surfaced.

/// Characters stripped from both ends of transcript text.
const WHITESPACE: &[char] = &[' ', '\t', '\n', '\r'];

/// One segment exactly as the engine emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub text: String,
    pub token_probs: Vec<f32>,
}

/// A segment that survived cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub confidence: f32,
}

/// Result of one transcription request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    /// All segment texts concatenated in emission order, then trimmed
    pub text: String,

    /// Non-empty cleaned segments, in emission order
    pub segments: Vec<Segment>,

    /// Mean token probability across all raw segments
    pub overall_confidence: f32,
}

impl TranscriptionResult {
    /// Build the client-facing result from raw engine segments.
    pub fn from_raw(raw: &[RawSegment]) -> Self {
        let full_text: String = raw.iter().map(|s| s.text.as_str()).collect();

        let segments = raw
            .iter()
            .filter_map(|s| {
                let cleaned = clean_text(&s.text);
                if cleaned.is_empty() {
                    None
                } else {
                    Some(Segment {
                        text: cleaned.to_string(),
                        confidence: mean(&s.token_probs),
                    })
                }
            })
            .collect();

        let all_tokens: Vec<f32> = raw.iter().flat_map(|s| s.token_probs.iter().copied()).collect();

        Self {
            text: clean_text(&full_text).to_string(),
            segments,
            overall_confidence: mean(&all_tokens),
        }
    }
}

/// Strip space, tab, newline and carriage return from both ends.
pub fn clean_text(text: &str) -> &str {
    text.trim_matches(WHITESPACE)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, probs: &[f32]) -> RawSegment {
        RawSegment {
            text: text.to_string(),
            token_probs: probs.to_vec(),
        }
    }

    #[test]
    fn test_empty_segment_dropped_but_counted() {
        let result = TranscriptionResult::from_raw(&[raw("  hi  ", &[0.8, 0.6]), raw("", &[0.1])]);

        assert_eq!(result.text, "hi");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].text, "hi");
        assert!((result.segments[0].confidence - 0.7).abs() < 1e-6);
        // (0.8 + 0.6 + 0.1) / 3
        assert!((result.overall_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_tokens() {
        let result = TranscriptionResult::from_raw(&[raw("hello", &[])]);
        assert_eq!(result.segments[0].confidence, 0.0);
        assert_eq!(result.overall_confidence, 0.0);
    }

    #[test]
    fn test_no_segments() {
        let result = TranscriptionResult::from_raw(&[]);
        assert_eq!(result.text, "");
        assert!(result.segments.is_empty());
        assert_eq!(result.overall_confidence, 0.0);
    }

    #[test]
    fn test_full_text_keeps_inner_whitespace() {
        let result = TranscriptionResult::from_raw(&[
            raw(" Привет,", &[0.9]),
            raw(" мир!\n", &[0.5]),
        ]);
        assert_eq!(result.text, "Привет, мир!");
        assert_eq!(result.segments[0].text, "Привет,");
        assert_eq!(result.segments[1].text, "мир!");
    }

    #[test]
    fn test_clean_text_only_strips_listed_whitespace() {
        assert_eq!(clean_text("\t\r\n a b \n"), "a b");
        // Non-breaking space is not in the trim set.
        assert_eq!(clean_text("\u{a0}x"), "\u{a0}x");
        assert_eq!(clean_text(" \t\r\n"), "");
    }
}
