//! Gemini `generateContent` image provider.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use genie_core::{
    application::ports::{GeneratedImage, ImageProvider, ProviderError, TokenUsage},
    domain::ResolutionTier,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Clone)]
pub struct GeminiCredentials {
    pub api_key: String,
}

impl fmt::Debug for GeminiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct GeminiImageProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    credentials: GeminiCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GeminiImageProvider {
    pub fn new(
        credentials: GeminiCredentials,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("landing-genie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            model: model.into(),
            credentials,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

/// Request body. Output size is only sent to models that accept it.
fn request_body(model: &str, prompt: &str, tier: ResolutionTier) -> Value {
    let mut generation_config = json!({ "responseModalities": ["IMAGE"] });
    if supports_image_size(model) {
        generation_config["imageConfig"] = json!({ "imageSize": tier.as_str() });
    }
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": generation_config,
    })
}

fn supports_image_size(model: &str) -> bool {
    model.trim_start_matches("models/").starts_with("gemini-3")
}

fn classify(status: StatusCode, body: &str) -> ProviderError {
    let message = format!("HTTP {status}: {}", summarize(body));
    if status == StatusCode::TOO_MANY_REQUESTS {
        let quota = body.contains("RESOURCE_EXHAUSTED") && body.to_ascii_lowercase().contains("quota");
        return if quota {
            ProviderError::QuotaExhausted(message)
        } else {
            ProviderError::Transient(message)
        };
    }
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ProviderError::Transient(message)
    } else {
        ProviderError::Permanent(message)
    }
}

/// `error.message` from a Google API error body, or the start of the body.
fn summarize(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn parse_image(body: &str) -> Result<GeneratedImage, ProviderError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Permanent(format!("unexpected response body: {e}")))?;

    let usage = response.usage_metadata.map(|u| TokenUsage {
        prompt_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
    });

    let mut finish_reason = None;
    for candidate in response.candidates {
        finish_reason = finish_reason.or(candidate.finish_reason);
        let inline = candidate
            .content
            .into_iter()
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data);
        if let Some(inline) = inline {
            let bytes = STANDARD
                .decode(inline.data.trim())
                .map_err(|e| ProviderError::Permanent(format!("image data is not base64: {e}")))?;
            return Ok(GeneratedImage {
                bytes,
                mime_type: inline.mime_type,
                usage,
            });
        }
    }

    Err(ProviderError::Permanent(match finish_reason {
        Some(reason) => format!("no image in response (finish reason {reason})"),
        None => "no image in response".into(),
    }))
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn model(&self) -> String {
        self.model.clone()
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, tier = %tier))]
    async fn generate(&self, prompt: &str, tier: ResolutionTier) -> Result<GeneratedImage, ProviderError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.credentials.api_key)
            .json(&request_body(&self.model, prompt, tier))
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("reading response: {e}")))?;
        debug!(%status, bytes = body.len(), "Gemini response");

        if !status.is_success() {
            return Err(classify(status, &body));
        }
        parse_image(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_only_for_models_that_take_it() {
        let body = request_body("gemini-3-pro-image-preview", "a cat", ResolutionTier::TwoK);
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "a cat");

        let body = request_body("gemini-2.5-flash-image", "a cat", ResolutionTier::TwoK);
        assert!(body["generationConfig"].get("imageConfig").is_none());
        assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn parses_inline_data_in_either_spelling() {
        let encoded = STANDARD.encode(b"png-bytes");
        for key in ["inlineData", "inline_data"] {
            let body = format!(
                r#"{{"candidates":[{{"content":{{"parts":[{{"text":"here"}},{{"{key}":{{"mimeType":"image/png","data":"{encoded}"}}}}]}}}}],
                    "usageMetadata":{{"promptTokenCount":12,"candidatesTokenCount":1290}}}}"#
            );
            let image = parse_image(&body).unwrap();
            assert_eq!(image.bytes, b"png-bytes");
            assert_eq!(
                image.usage,
                Some(TokenUsage {
                    prompt_tokens: 12,
                    output_tokens: 1290
                })
            );
        }
    }

    #[test]
    fn missing_image_is_permanent() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"no"}]},"finishReason":"SAFETY"}]}"#;
        match parse_image(body) {
            Err(ProviderError::Permanent(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("expected permanent error, got {other:?}"),
        }
    }

    #[test]
    fn quota_is_told_apart_from_rate_limiting() {
        let quota = r#"{"error":{"code":429,"message":"You exceeded your current quota","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, quota),
            ProviderError::QuotaExhausted(_)
        ));

        let burst = r#"{"error":{"code":429,"message":"Too many requests","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, burst),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad prompt"}}"#),
            ProviderError::Permanent(m) if m.contains("bad prompt")
        ));
    }

    #[test]
    fn endpoint_strips_models_prefix() {
        let provider = GeminiImageProvider::new(
            GeminiCredentials { api_key: "k".into() },
            "models/gemini-2.5-flash-image",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }
}
