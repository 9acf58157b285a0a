//! Image generator trait.

use crate::error::Result;
use crate::image::types::{EmbeddedImage, GenerationOptions};
use async_trait::async_trait;

/// A service that turns generation options into an image.
///
/// One call is one attempt. Implementations never retry on their own.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates an image from the given options.
    async fn generate(&self, options: &GenerationOptions) -> Result<EmbeddedImage>;

    /// Returns the name of this generator for display and logs.
    fn name(&self) -> &str;
}
