//! AI service integration for photo editing and description
//!
//! Defines the two remote capabilities the controller depends on and provides
//! Gemini-backed implementations plus in-memory mocks.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::{GeminiDescriptionClient, GeminiEditClient};
pub use mock::{MockPhotoDescriptionClient, MockPhotoEditClient};

use crate::models::EncodedImage;
use crate::Result;
use async_trait::async_trait;

/// Produces a new image from an existing one and a free-text instruction.
#[async_trait]
pub trait PhotoEditService: Send + Sync {
    async fn edit_photo(&self, image: &EncodedImage, prompt: &str) -> Result<EncodedImage>;
}

/// Produces a natural-language analysis of an image.
#[async_trait]
pub trait PhotoDescriptionService: Send + Sync {
    async fn describe_photo(&self, image: &EncodedImage) -> Result<String>;
}
