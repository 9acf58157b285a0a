#![warn(missing_docs)]
//! ImageReady - one-click image generation.
//!
//! Collects a prompt, a style, an aspect ratio and an optional reference
//! image, sends them to an image generator, and tracks the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use imageready::{DraftStore, FileStore, GeminiClient, GenerationSession, ImageStyle};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> imageready::Result<()> {
//!     let generator = Arc::new(GeminiClient::builder().build());
//!     let drafts = DraftStore::new(Arc::new(FileStore::new("drafts.json")));
//!     let mut session = GenerationSession::new(generator, drafts);
//!
//!     session.set_prompt("A lighthouse on a cliff at dusk");
//!     session.set_style(ImageStyle::Cinematic);
//!
//!     if let Some(image) = session.request_generation().await.image() {
//!         image.save(imageready::DOWNLOAD_FILENAME)?;
//!     }
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini (Google) image generation client
//! - `cli`: Command-line interface

pub mod draft;
mod error;
pub mod image;
pub mod media;
pub mod session;
pub mod speech;

// Re-export error types at crate root
pub use error::{ImageReadyError, Result, GENERIC_ERROR_MESSAGE, NO_IMAGE_MESSAGE};

pub use draft::{DraftStore, FileStore, KeyValueStore, MemoryStore};
pub use image::{
    AspectRatio, EmbeddedImage, GenerationOptions, ImageGenerator, ImageStyle, DOWNLOAD_FILENAME,
    PROMPT_MAX_LENGTH,
};
pub use session::{GenerationSession, GenerationState, PendingGeneration};
pub use speech::{SpeechError, SpeechEvent, SpeechInput, SpeechRecognizer, SpeechState};

#[cfg(feature = "gemini")]
pub use image::{GeminiClient, GeminiClientBuilder, GeminiModel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::draft::{DraftStore, FileStore, KeyValueStore};
    pub use crate::error::{ImageReadyError, Result};
    pub use crate::image::{
        AspectRatio, EmbeddedImage, GenerationOptions, ImageGenerator, ImageStyle,
    };
    pub use crate::session::{GenerationSession, GenerationState};
    pub use crate::speech::{SpeechEvent, SpeechInput, SpeechRecognizer};

    #[cfg(feature = "gemini")]
    pub use crate::image::GeminiClient;
}
