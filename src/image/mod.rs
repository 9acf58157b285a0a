//! Image generation module.

#[cfg(feature = "gemini")]
mod gemini;
mod provider;
mod types;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiClient, GeminiClientBuilder, GeminiModel};
pub use provider::ImageGenerator;
pub use types::{
    AspectRatio, EmbeddedImage, GenerationOptions, ImageFormat, ImageStyle, DOWNLOAD_FILENAME,
    PROMPT_MAX_LENGTH,
};
