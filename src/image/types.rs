//! Core types for image generation.

use crate::error::{ImageReadyError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Maximum prompt length, in code points.
pub const PROMPT_MAX_LENGTH: usize = 1000;

/// Suggested file name when saving a generated image.
pub const DOWNLOAD_FILENAME: &str = "one-click-image.png";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        None
    }
}

/// Aspect ratios offered for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape (widescreen).
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall).
    #[serde(rename = "9:16")]
    Portrait,
    /// 1:1 square.
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// All ratios, in display order.
    pub const ALL: [AspectRatio; 3] = [Self::Landscape, Self::Portrait, Self::Square];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named visual treatment folded into the prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageStyle {
    /// Dramatic, movie-like lighting.
    #[default]
    Cinematic,
    /// Computer-generated, three-dimensional look.
    #[serde(rename = "3D Style")]
    ThreeD,
    /// Cartoon or animated illustration.
    Animation,
    /// Prompt is sent unmodified.
    #[serde(rename = "None")]
    Unstyled,
}

impl ImageStyle {
    /// All styles, in display order.
    pub const ALL: [ImageStyle; 4] = [Self::Cinematic, Self::ThreeD, Self::Animation, Self::Unstyled];

    /// Returns the style name as shown to the user.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cinematic => "Cinematic",
            Self::ThreeD => "3D Style",
            Self::Animation => "Animation",
            Self::Unstyled => "None",
        }
    }

    /// One-line description of what the style does.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Cinematic => {
                "Creates dramatic, movie-like images with high contrast and emotional lighting."
            }
            Self::ThreeD => "Generates images with a computer-generated, three-dimensional look.",
            Self::Animation => "Produces images in a cartoon or animated illustration style.",
            Self::Unstyled => {
                "Generates the image based purely on your prompt without a specific style."
            }
        }
    }

    /// Builds the text prompt sent to the generator.
    ///
    /// Returns `None` when there is no text to send at all.
    pub fn apply(&self, prompt: &str) -> Option<String> {
        match (self, prompt.is_empty()) {
            (Self::Unstyled, true) => None,
            (Self::Unstyled, false) => Some(prompt.to_string()),
            (style, true) => Some(style.as_str().to_string()),
            (style, false) => Some(format!("{}, {}", style.as_str(), prompt)),
        }
    }
}

impl std::fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An image carried as a `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    mime_type: String,
    data: String,
}

impl EmbeddedImage {
    /// Wraps an already base64-encoded payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }

    /// Parses a `data:image/<subtype>;base64,<payload>` URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || ImageReadyError::InputDecoding("expected data:image/<type>;base64,<data>".into());

        let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
        let (mime_type, data) = rest.split_once(";base64,").ok_or_else(invalid)?;
        let subtype = mime_type.strip_prefix("image/").ok_or_else(invalid)?;

        let subtype_ok = !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !subtype_ok || data.contains(['\n', '\r']) {
            return Err(invalid());
        }

        Ok(Self::new(mime_type, data))
    }

    /// MIME type, e.g. `image/png`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload, without the URI prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Renders the data URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decodes the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| ImageReadyError::Decode(e.to_string()))
    }

    /// Saves the decoded image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }
}

impl FromStr for EmbeddedImage {
    type Err = ImageReadyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for EmbeddedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Everything the user has chosen for the next generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Free-text prompt, at most [`PROMPT_MAX_LENGTH`] code points.
    pub prompt: String,
    /// Requested aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Style prefixed onto the prompt.
    pub style: ImageStyle,
    /// Things the image should avoid.
    pub negative_prompt: String,
    /// Seed for reproducible output; always positive when set.
    pub seed: Option<u64>,
    /// Optional reference image.
    pub reference_image: Option<EmbeddedImage>,
}

impl GenerationOptions {
    /// Creates options with the given prompt and default settings.
    ///
    /// Prompts over the length bound are cut at the bound.
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt: String = prompt.into();
        Self {
            prompt: prompt.chars().take(PROMPT_MAX_LENGTH).collect(),
            ..Self::default()
        }
    }

    /// Replaces the prompt. Over-length text is rejected and leaves the prompt as it was.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> bool {
        let prompt = prompt.into();
        if prompt.chars().count() > PROMPT_MAX_LENGTH {
            return false;
        }
        self.prompt = prompt;
        true
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the style.
    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the negative prompt.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = negative.into();
        self
    }

    /// Sets the seed. Zero means "no seed".
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = (seed > 0).then_some(seed);
        self
    }

    /// Sets the reference image.
    pub fn with_reference_image(mut self, image: EmbeddedImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// True when there is something to generate from.
    pub fn has_input(&self) -> bool {
        !self.prompt.is_empty() || self.reference_image.is_some()
    }

    /// The text prompt after the style has been applied.
    pub fn effective_prompt(&self) -> Option<String> {
        self.style.apply(&self.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a\0\0\0\0\0\0"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_style_prefixes_prompt() {
        assert_eq!(
            ImageStyle::Cinematic.apply("a lighthouse").as_deref(),
            Some("Cinematic, a lighthouse")
        );
        assert_eq!(
            ImageStyle::ThreeD.apply("a lighthouse").as_deref(),
            Some("3D Style, a lighthouse")
        );
        assert_eq!(
            ImageStyle::Unstyled.apply("a lighthouse").as_deref(),
            Some("a lighthouse")
        );
    }

    #[test]
    fn test_style_with_empty_prompt() {
        assert_eq!(ImageStyle::Unstyled.apply(""), None);
        assert_eq!(ImageStyle::Animation.apply("").as_deref(), Some("Animation"));
    }

    #[test]
    fn test_defaults() {
        let options = GenerationOptions::default();
        assert_eq!(options.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(options.style, ImageStyle::Cinematic);
        assert!(!options.has_input());
    }

    #[test]
    fn test_set_prompt_rejects_over_length() {
        let mut options = GenerationOptions::new("keep me");
        assert!(!options.set_prompt("a".repeat(PROMPT_MAX_LENGTH + 1)));
        assert_eq!(options.prompt, "keep me");

        assert!(options.set_prompt("é".repeat(PROMPT_MAX_LENGTH)));
        assert_eq!(options.prompt.chars().count(), PROMPT_MAX_LENGTH);
    }

    #[test]
    fn test_new_truncates_at_bound() {
        let options = GenerationOptions::new("b".repeat(PROMPT_MAX_LENGTH * 2));
        assert_eq!(options.prompt.chars().count(), PROMPT_MAX_LENGTH);
    }

    #[test]
    fn test_zero_seed_is_no_seed() {
        assert_eq!(GenerationOptions::new("x").with_seed(0).seed, None);
        assert_eq!(GenerationOptions::new("x").with_seed(7).seed, Some(7));
    }

    #[test]
    fn test_embedded_image_parse() {
        let image = EmbeddedImage::parse("data:image/png;base64,AAA=").unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.data(), "AAA=");
        assert_eq!(image.to_data_uri(), "data:image/png;base64,AAA=");
        assert_eq!(image.to_string(), image.to_data_uri());
    }

    #[test]
    fn test_embedded_image_parse_rejects_malformed() {
        for bad in [
            "AAA=",
            "data:image/png,AAA=",
            "data:text/plain;base64,AAA=",
            "data:image/;base64,AAA=",
            "data:image/svg+xml;base64,AAA=",
            "data:image/png;base64,AA\nA=",
        ] {
            assert!(
                matches!(EmbeddedImage::parse(bad), Err(ImageReadyError::InputDecoding(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_embedded_image_bytes() {
        let image = EmbeddedImage::from_bytes("image/png", &PNG_MAGIC);
        assert_eq!(image.decode().unwrap(), PNG_MAGIC.to_vec());
    }

    #[test]
    fn test_aspect_ratio_serde_names() {
        assert_eq!(serde_json::to_string(&AspectRatio::Portrait).unwrap(), "\"9:16\"");
        assert_eq!(serde_json::to_string(&ImageStyle::ThreeD).unwrap(), "\"3D Style\"");
    }
}
