//! Wire types for the Gemini `generateContent` endpoint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

// ══════════════════════════════════════════════════════════════════════════════
// REQUEST TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<&'static str>,
}

impl GenerationConfig {
    /// Text and image outputs, used by every image-producing call.
    pub fn text_and_image() -> Self {
        Self {
            response_modalities: vec!["TEXT", "IMAGE"],
        }
    }

    /// Text-only output, used by describe-style calls.
    pub fn text_only() -> Self {
        Self {
            response_modalities: vec!["TEXT"],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".into()),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".into()),
            parts,
        }
    }
}

/// One part of a content: either text or inline image data. Exactly one of
/// the fields is set; serialization skips the other.
#[derive(Debug, Clone, Serialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline_image(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: BASE64.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

// ══════════════════════════════════════════════════════════════════════════════
// RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
    #[serde(rename = "inlineData")]
    pub inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseInlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::text("a cat"),
                Part::inline_image("image/png", b"abc"),
            ])],
            generation_config: GenerationConfig::text_and_image(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "a cat");
        assert!(parts[0].get("inlineData").is_none());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert!(parts[1].get("text").is_none());
    }

    #[test]
    fn test_roleless_content_omits_role() {
        let content = Content {
            role: None,
            parts: vec![Part::text("hi")],
        };
        let value = serde_json::to_value(&content).unwrap();
        assert!(value.get("role").is_none());
    }

    #[test]
    fn test_response_parses_image_and_text() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "aW1n"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        });

        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        let candidates = response.candidates.unwrap();
        let candidate = &candidates[0];
        assert_eq!(candidate.finish_reason.as_deref(), Some("STOP"));
        let parts = &candidate.content.as_ref().unwrap().parts;
        assert_eq!(parts[0].text.as_deref(), Some("here you go"));
        assert_eq!(
            parts[1].inline_data.as_ref().unwrap().data.as_deref(),
            Some("aW1n")
        );
    }

    #[test]
    fn test_response_parses_error_body() {
        let body = json!({"error": {"message": "quota exhausted", "code": 429}});
        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.message, "quota exhausted");
        assert_eq!(error.code, Some(429));
    }
}
