//! Blocking client for the Gemini `generateContent` endpoint.
//!
//! One utterance maps to exactly one request: prompt text plus the WAV bytes
//! as base64 inline data. There are no retries; any failure is reported to
//! the status line and the utterance is dropped.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::audio::wav::MIME_TYPE;

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Hard deadline for the whole request, connect included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("malformed API response: {0}")]
    Malformed(String),
}

/// Result of a successful API exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// Non-empty transcribed text, already trimmed.
    Text(String),
    /// The model returned nothing usable; `reason` is the block or finish
    /// reason when the API supplied one.
    Empty { reason: Option<String> },
}

/// Transcription seam, mocked in worker tests.
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptionBackend: Send {
    fn transcribe(&self, wav: &[u8], prompt: &str) -> Result<Transcript, TranscriptionError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Response {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SafetyRating {
    category: Option<String>,
    probability: Option<String>,
    blocked: bool,
}

/// Client bound to one API key and model for the duration of one utterance.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, TranscriptionError> {
        if api_key.trim().is_empty() {
            return Err(TranscriptionError::MissingApiKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: API_BASE.to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl TranscriptionBackend for GeminiClient {
    fn transcribe(&self, wav: &[u8], prompt: &str) -> Result<Transcript, TranscriptionError> {
        let audio_b64 = base64::engine::general_purpose::STANDARD.encode(wav);
        let body = Request {
            contents: vec![Content {
                parts: vec![
                    Part::Text(prompt),
                    Part::InlineData(InlineData {
                        mime_type: MIME_TYPE,
                        data: audio_b64,
                    }),
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!(model = %self.model, wav_bytes = wav.len(), "sending transcription request");
        let response = self.http.post(&url).json(&body).send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                detail: extract_error_detail(&text),
            });
        }

        debug!(bytes = text.len(), "transcription response received");
        parse_response(&text)
    }
}

/// Pull the transcript (or the reason nothing came back) out of a
/// `generateContent` response body.
fn parse_response(body: &str) -> Result<Transcript, TranscriptionError> {
    let response: Response =
        serde_json::from_str(body).map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

    let mut finish_reason = None;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .map(|candidate| {
            finish_reason = candidate.finish_reason;
            candidate
                .content
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default()
        })
        .unwrap_or_default();

    let trimmed = text.trim();
    if !trimmed.is_empty() {
        return Ok(Transcript::Text(trimmed.to_owned()));
    }

    // Blocked prompts may carry an explicit block reason, or only a set of
    // safety ratings with `blocked` flags. Fall back through both before
    // settling for the candidate's finish reason.
    let reason = response
        .prompt_feedback
        .and_then(|feedback| {
            feedback.block_reason.or_else(|| {
                feedback
                    .safety_ratings
                    .into_iter()
                    .find(|rating| rating.blocked)
                    .map(|rating| {
                        format!(
                            "Blocked: {} ({})",
                            rating.category.as_deref().unwrap_or("UNKNOWN"),
                            rating.probability.as_deref().unwrap_or("UNKNOWN"),
                        )
                    })
            })
        })
        .or(finish_reason);

    Ok(Transcript::Empty { reason })
}

/// Best-effort extraction of the `error.message` field from an error body.
fn extract_error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", "gemini-2.0-flash"),
            Err(TranscriptionError::MissingApiKey)
        ));
    }

    #[test]
    fn test_parse_text_response() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "  hello world  "}]},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Text("hello world".to_owned())
        );
    }

    #[test]
    fn test_parse_multi_part_response() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "first "}, {"text": "second"}]}
            }]
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Text("first second".to_owned())
        );
    }

    #[test]
    fn test_parse_blocked_response() {
        let body = r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Empty {
                reason: Some("SAFETY".to_owned())
            }
        );
    }

    #[test]
    fn test_parse_safety_rating_block_without_block_reason() {
        let body = r#"{
            "candidates": [],
            "promptFeedback": {
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "LOW", "blocked": false},
                    {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "probability": "HIGH", "blocked": true}
                ]
            }
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Empty {
                reason: Some("Blocked: HARM_CATEGORY_DANGEROUS_CONTENT (HIGH)".to_owned())
            }
        );
    }

    #[test]
    fn test_parse_block_reason_wins_over_safety_ratings() {
        let body = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "OTHER",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "HIGH", "blocked": true}
                ]
            }
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Empty {
                reason: Some("OTHER".to_owned())
            }
        );
    }

    #[test]
    fn test_parse_unblocked_safety_ratings_give_no_reason() {
        let body = r#"{
            "candidates": [],
            "promptFeedback": {
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "NEGLIGIBLE", "blocked": false}
                ]
            }
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Empty { reason: None }
        );
    }

    #[test]
    fn test_parse_no_candidates() {
        assert_eq!(
            parse_response("{}").unwrap(),
            Transcript::Empty { reason: None }
        );
    }

    #[test]
    fn test_parse_whitespace_only_text_is_empty() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "   \n  "}]},
                "finishReason": "MAX_TOKENS"
            }]
        }"#;
        assert_eq!(
            parse_response(body).unwrap(),
            Transcript::Empty {
                reason: Some("MAX_TOKENS".to_owned())
            }
        );
    }

    #[test]
    fn test_parse_malformed_json() {
        assert!(matches!(
            parse_response("not json"),
            Err(TranscriptionError::Malformed(_))
        ));
    }

    #[test]
    fn test_error_detail_extraction() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(extract_error_detail(body), "API key not valid");
    }

    #[test]
    fn test_error_detail_fallback_truncates() {
        let body = "x".repeat(500);
        assert_eq!(extract_error_detail(&body).len(), 200);
    }

    #[test]
    fn test_request_body_shape() {
        let body = Request {
            contents: vec![Content {
                parts: vec![
                    Part::Text("transcribe this"),
                    Part::InlineData(InlineData {
                        mime_type: MIME_TYPE,
                        data: "QUJD".to_owned(),
                    }),
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "transcribe this");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "audio/wav"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "QUJD");
    }

    #[test]
    fn test_url_shape() {
        let client = GeminiClient::new("key123", "gemini-2.0-flash")
            .unwrap()
            .with_base_url("http://localhost:9");
        assert_eq!(client.base_url, "http://localhost:9");
        assert_eq!(client.model, "gemini-2.0-flash");
        assert_eq!(client.api_key, "key123");
    }
}
