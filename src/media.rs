//! Reference image input.
//!
//! Turns a local file into an [`EmbeddedImage`]. The MIME type comes from the
//! file extension, falling back to the file's magic bytes when the extension
//! says nothing useful.

use crate::error::{ImageReadyError, Result};
use crate::image::{EmbeddedImage, ImageFormat};
use std::path::Path;

/// Reads an image file and encodes it as a data URI.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<EmbeddedImage> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;

    let mime_type = mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .or_else(|| ImageFormat::from_magic_bytes(&bytes).map(|f| f.mime_type().to_string()))
        .ok_or_else(|| {
            ImageReadyError::InputDecoding(format!("{} is not an image", path.display()))
        })?;

    Ok(EmbeddedImage::from_bytes(mime_type, &bytes))
}

/// Like [`encode_file`], but a failed read yields nothing instead of an error.
pub async fn load_reference_image(path: impl AsRef<Path>) -> Option<EmbeddedImage> {
    let path = path.as_ref();
    match encode_file(path).await {
        Ok(image) => {
            tracing::debug!(path = %path.display(), mime_type = image.mime_type(), "reference image loaded");
            Some(image)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not read reference image: {e}");
            None
        }
    }
}
