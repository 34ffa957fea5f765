//! Image handling stages shared by every backend.
//!
//! - **decode**: base64 / raw bytes to a raster image, with limits and timeout
//! - **normalize**: bound the pixel count while keeping aspect ratio
//! - **encode**: raster image to base64 JPEG for transport

pub mod decode;
pub mod encode;
pub mod normalize;

// Re-exports for convenient access
pub use decode::{decode_payload, DecodedImage, ImageDecoder};
pub use encode::{encode_base64_jpeg, encode_jpeg};
pub use normalize::{Normalizer, DEFAULT_MAX_PIXELS};
