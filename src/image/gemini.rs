//! Gemini (Google) image generation client.

use crate::error::{parse_retry_after, sanitize_error_message, ImageReadyError, Result};
use crate::image::provider::ImageGenerator;
use crate::image::types::{EmbeddedImage, GenerationOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for the API key, in order.
const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image (highest quality).
    ProImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for [`GeminiClient`].
#[derive(Debug, Clone, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl GeminiClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Uses an existing HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client.
    ///
    /// A missing API key is not an error here; it is reported by the first
    /// call to [`GeminiClient::generate`](ImageGenerator::generate).
    pub fn build(self) -> GeminiClient {
        let api_key = self.api_key.or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        });

        GeminiClient {
            client: self.client.unwrap_or_default(),
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

/// Gemini image generation client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: GeminiModel,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClientBuilder`.
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    /// Returns the model this client talks to.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(&self, options: &GenerationOptions) -> Result<EmbeddedImage> {
        // Input problems are reported before the credential or the network is touched.
        let body = GeminiRequest::from_options(options)?;

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ImageReadyError::Auth(
                "API key not configured: set GEMINI_API_KEY or GOOGLE_API_KEY".into(),
            )
        })?;

        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        tracing::debug!(
            model = self.model.as_str(),
            parts = body.contents[0].parts.len(),
            aspect_ratio = %options.aspect_ratio,
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = gemini_response.into_image()?;

        tracing::info!(
            model = self.model.as_str(),
            mime_type = image.mime_type(),
            duration_ms = start.elapsed().as_millis() as u64,
            "image generated"
        );

        Ok(image)
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> ImageReadyError {
        let text = sanitize_error_message(text);
        if status == 404 {
            let hint = "Model not found. Verify the model name is correct.";
            return ImageReadyError::InvalidRequest(if text.is_empty() {
                hint.to_string()
            } else {
                format!("{hint} ({text})")
            });
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return ImageReadyError::RateLimited {
                message: text,
                retry_after,
            };
        }
        if status == 401 || status == 403 {
            return ImageReadyError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety")
            || lower.contains("blocked")
            || lower.contains("content_policy")
            || lower.contains("prohibited")
        {
            return ImageReadyError::ContentBlocked(text);
        }
        ImageReadyError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, options: &GenerationOptions) -> Result<EmbeddedImage> {
        self.generate_impl(options).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
}

impl GeminiRequest {
    fn from_options(options: &GenerationOptions) -> Result<Self> {
        if !options.has_input() {
            return Err(ImageReadyError::InvalidRequest(
                "Prompt or reference image must be provided.".into(),
            ));
        }

        let mut parts = Vec::new();

        // Reference image goes first, then the styled prompt.
        if let Some(ref image) = options.reference_image {
            let image = EmbeddedImage::parse(&image.to_data_uri())?;
            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type().to_string(),
                    data: image.data().to_string(),
                },
            });
        }

        if let Some(text) = options.effective_prompt() {
            parts.push(GeminiRequestPart::Text { text });
        }

        let negative = options.negative_prompt.trim();
        if !negative.is_empty() {
            parts.push(GeminiRequestPart::Text {
                text: format!("Avoid: {negative}"),
            });
        }

        Ok(Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: options.aspect_ratio.as_str().to_string(),
                },
                seed: options.seed,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiResponse {
    /// Takes the first image-bearing part, in candidate then part order.
    fn into_image(self) -> Result<EmbeddedImage> {
        let mut finish_reason = None;

        for candidate in self.candidates {
            if let Some(content) = candidate.content {
                if let Some(inline) = content.parts.into_iter().find_map(|p| p.inline_data) {
                    return Ok(EmbeddedImage::new(inline.mime_type, inline.data));
                }
            }
            if finish_reason.is_none() {
                finish_reason = candidate.finish_reason.filter(|r| r != "STOP");
            }
        }

        let blocked = self.prompt_feedback.and_then(|feedback| {
            feedback.block_reason_message.or(feedback
                .block_reason
                .map(|reason| format!("Prompt blocked: {reason}")))
        });

        let reason = blocked.or(finish_reason);
        tracing::warn!(reason = ?reason, "Gemini response contained no image");
        Err(ImageReadyError::NoImageProduced { reason })
    }
}
