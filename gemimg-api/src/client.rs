//! Gemini `generateContent` client.

use crate::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gemimg_common::{Config, Error, Result};
use reqwest::Client;
use std::time::Duration;

const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// An image handed to the API: raw bytes plus mime type.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    fn to_part(&self) -> Part {
        Part::inline_image(self.mime_type.clone(), &self.bytes)
    }
}

/// Outcome of one API call: the model may return an image, text, or both.
/// Text without an image is usually a content-policy refusal.
#[derive(Debug, Clone, Default)]
pub struct ImageResult {
    pub image: Option<Vec<u8>>,
    pub text: Option<String>,
}

/// The four calls the plugin makes against the image model.
///
/// A trait seam so the handler can be exercised with a mock implementation
/// and so the retry wrapper can stack on any backend.
#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Generate an image from a prompt, with optional conversation history.
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<ImageResult>;

    /// Edit an existing image according to the prompt.
    async fn edit(
        &self,
        prompt: &str,
        image: &InlineImage,
        history: &[Content],
    ) -> Result<ImageResult>;

    /// Compose several images into one according to the prompt.
    async fn compose(&self, prompt: &str, images: &[InlineImage]) -> Result<ImageResult>;

    /// Text-only call: describe an image, or transform a prompt when no
    /// image is given.
    async fn describe(&self, prompt: &str, image: Option<&InlineImage>) -> Result<ImageResult>;
}

enum Endpoint {
    /// Google endpoint, API key as `key` query parameter.
    Direct,
    /// Relay base URL, API key as Bearer token.
    ProxyService(String),
}

/// Gemini image client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    endpoint: Endpoint,
    client: Client,
}

impl GeminiClient {
    /// Build a client from the plugin configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = if config.proxy.use_proxy_service {
            if config.proxy.proxy_service_url.is_empty() {
                return Err(Error::Config(
                    "use_proxy_service requires proxy_service_url".into(),
                ));
            }
            Endpoint::ProxyService(config.proxy.proxy_service_url.trim_end_matches('/').to_string())
        } else {
            Endpoint::Direct
        };

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        // HTTP proxy only applies to direct Google calls.
        if config.proxy.enable_proxy
            && !config.proxy.proxy_url.is_empty()
            && !config.proxy.use_proxy_service
        {
            let proxy = reqwest::Proxy::all(&config.proxy.proxy_url)
                .map_err(|e| Error::Config(format!("invalid proxy_url: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
            endpoint,
            client,
        })
    }

    /// Client against an explicit base URL with key-as-query auth. Test
    /// seam; production construction goes through [`GeminiClient::new`].
    pub fn with_base_url(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: Endpoint::ProxyService(base.trim_end_matches('/').to_string()),
            client: Client::new(),
        }
    }

    fn url(&self) -> String {
        let base = match &self.endpoint {
            Endpoint::Direct => GOOGLE_API_BASE,
            Endpoint::ProxyService(base) => base.as_str(),
        };
        format!("{base}/v1beta/models/{}:generateContent", self.model)
    }

    async fn call(
        &self,
        contents: Vec<Content>,
        generation_config: GenerationConfig,
    ) -> Result<ImageResult> {
        if self.api_key.is_empty() {
            return Err(Error::Config(
                "Gemini API key not configured. Set gemini_api_key or GEMINI_API_KEY.".into(),
            ));
        }

        let request = GenerateContentRequest {
            contents,
            generation_config,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        builder = match &self.endpoint {
            Endpoint::Direct => builder.query(&[("key", self.api_key.as_str())]),
            Endpoint::ProxyService(_) => builder.bearer_auth(&self.api_key),
        };

        tracing::debug!(model = %self.model, "Calling Gemini generateContent");
        let response = builder
            .send()
            .await
            .map_err(|e| Error::External(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %truncate(&body, 200), "Gemini API error");
            return Err(match status.as_u16() {
                400 => Error::InvalidInput(format!("API rejected request: {}", truncate(&body, 200))),
                401 | 403 => Error::Config("API key rejected by Gemini".into()),
                _ => Error::External(format!("API error ({})", status.as_u16())),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::External(format!("failed to read response: {e}")))?;
        if body.trim().is_empty() {
            return Err(Error::External("API returned an empty response".into()));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::External(format!("unparseable response: {e}")))?;

        Self::extract(parsed)
    }

    fn extract(response: GenerateContentResponse) -> Result<ImageResult> {
        if let Some(error) = response.error {
            return Err(Error::External(format!("API error: {}", error.message)));
        }

        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| Error::External("no candidates in response".into()))?;

        if candidate.finish_reason.as_deref() == Some("IMAGE_SAFETY") {
            return Err(Error::Refused("IMAGE_SAFETY".into()));
        }

        let mut result = ImageResult::default();
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text {
                    if !text.is_empty() {
                        result.text = Some(text);
                    }
                }
                if let Some(inline) = part.inline_data {
                    if let Some(data) = inline.data {
                        let bytes = BASE64
                            .decode(data)
                            .map_err(|e| Error::External(format!("bad image payload: {e}")))?;
                        result.image = Some(bytes);
                    }
                }
            }
        }

        if result.image.is_none() && result.text.is_none() {
            return Err(Error::External("response contained no usable parts".into()));
        }
        Ok(result)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl ImageApi for GeminiClient {
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<ImageResult> {
        let mut contents = history.to_vec();
        contents.push(Content::user(vec![Part::text(prompt)]));
        self.call(contents, GenerationConfig::text_and_image()).await
    }

    async fn edit(
        &self,
        prompt: &str,
        image: &InlineImage,
        history: &[Content],
    ) -> Result<ImageResult> {
        let mut contents = history.to_vec();
        contents.push(Content::user(vec![Part::text(prompt), image.to_part()]));
        self.call(contents, GenerationConfig::text_and_image()).await
    }

    async fn compose(&self, prompt: &str, images: &[InlineImage]) -> Result<ImageResult> {
        let mut parts = vec![Part::text(prompt)];
        parts.extend(images.iter().map(InlineImage::to_part));
        self.call(vec![Content::user(parts)], GenerationConfig::text_and_image())
            .await
    }

    async fn describe(&self, prompt: &str, image: Option<&InlineImage>) -> Result<ImageResult> {
        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = image {
            parts.push(image.to_part());
        }
        self.call(vec![Content::user(parts)], GenerationConfig::text_only())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image_response() -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "a blue cat"},
                        {"inlineData": {"mimeType": "image/png", "data": BASE64.encode(b"png-bytes")}}
                    ]
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_parses_image_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("authorization", "Bearer k"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("k", "test-model", server.uri());
        let result = client.generate("a blue cat", &[]).await.unwrap();
        assert_eq!(result.image.as_deref(), Some(b"png-bytes".as_slice()));
        assert_eq!(result.text.as_deref(), Some("a blue cat"));
    }

    #[tokio::test]
    async fn test_describe_requests_text_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseModalities": ["TEXT"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "a cat on a mat"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("k", "test-model", server.uri());
        let result = client.describe("describe this", None).await.unwrap();
        assert_eq!(result.text.as_deref(), Some("a cat on a mat"));
        assert!(result.image.is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("bad", "test-model", server.uri());
        let err = client.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable_external() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("k", "test-model", server.uri());
        let err = client.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_image_safety_is_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "IMAGE_SAFETY"}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("k", "test-model", server.uri());
        let err = client.edit("x", &InlineImage::new(vec![1, 2, 3], "image/png"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Refused(_)));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = GeminiClient::with_base_url("", "test-model", "http://127.0.0.1:1");
        let err = client.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_extract_rejects_empty_candidate() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": []}}]})).unwrap();
        assert!(GeminiClient::extract(response).is_err());
    }
}
