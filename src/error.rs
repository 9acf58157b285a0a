//! Error types for image generation and the session around it.

use std::time::Duration;

/// Fallback shown when an error renders to nothing useful.
pub const GENERIC_ERROR_MESSAGE: &str = "An unknown error occurred.";

/// Message attached to responses that carried no image.
pub const NO_IMAGE_MESSAGE: &str = "No image was generated. The prompt may have been blocked.";

/// Errors that can occur while preparing, sending or storing a generation.
#[derive(Debug, thiserror::Error)]
pub enum ImageReadyError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit or quota exceeded.
    #[error("{}", rate_limited_text(.message, .retry_after))]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Request rejected by the provider's content policy.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The request failed local validation and was never sent.
    #[error("{0}")]
    InvalidRequest(String),

    /// Embedded image data was not a well-formed image data URI.
    #[error("Invalid base64 image data: {0}")]
    InputDecoding(String),

    /// A well-formed response that did not contain an image.
    #[error("{}", no_image_text(.reason))]
    NoImageProduced { reason: Option<String> },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading a reference image, saving a result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Draft storage could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

fn no_image_text(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("{NO_IMAGE_MESSAGE} ({reason})"),
        None => NO_IMAGE_MESSAGE.to_string(),
    }
}

fn rate_limited_text(message: &str, retry_after: &Option<Duration>) -> String {
    let mut text = if message.is_empty() {
        "rate limited".to_string()
    } else {
        format!("rate limited: {message}")
    };
    if let Some(delay) = retry_after {
        text.push_str(&format!(" (retry after {}s)", delay.as_secs()));
    }
    text
}

impl ImageReadyError {
    /// Returns the text shown to the user for this error.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, ImageReadyError>;

/// Longest error body surfaced to the user.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Reduces a raw API error body to something fit for display.
///
/// Pulls `error.message` out of JSON bodies, redacts anything that looks
/// like an API key and caps the length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string());

    let redacted = extracted
        .split_whitespace()
        .map(|word| if word.starts_with("AIza") { "[redacted]" } else { word })
        .collect::<Vec<_>>()
        .join(" ");

    if redacted.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = redacted.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        redacted
    }
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
