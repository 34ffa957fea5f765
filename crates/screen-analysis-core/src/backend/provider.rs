//! The caption backend trait and its request/response types.

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::AnalysisError;
use crate::types::Backend;

/// A request to caption one image.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// The decoded image; backends normalize it themselves
    pub image: DynamicImage,
    /// Text prompt for the model
    pub prompt: String,
    /// Optional model override (ignored by backends with a fixed model)
    pub model: Option<String>,
}

/// Text produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    /// Generated text, whitespace-trimmed
    pub text: String,
    /// Model identifier that produced it
    pub model: String,
}

/// Contract every captioning backend implements.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the router hands out `&dyn CaptionBackend`).
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> Backend;

    /// Model used when the request does not override it.
    fn default_model(&self) -> &str;

    /// Check whether the backend is ready to serve (reachable / files present).
    async fn is_available(&self) -> bool;

    /// Generate a caption for the given image and prompt.
    async fn caption(&self, request: CaptionRequest) -> Result<Caption, AnalysisError>;
}
