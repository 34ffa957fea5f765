//! Transport encoding: raster image to base64 JPEG.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::AnalysisError;

/// Encode an image as JPEG bytes.
///
/// JPEG has no alpha channel, so the image is flattened to RGB8 first
/// (screenshots from a canvas or PNG uploads are usually RGBA).
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, AnalysisError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| AnalysisError::Internal(format!("JPEG encoding failed: {e}")))?;

    Ok(buffer.into_inner())
}

/// Encode an image as a base64 JPEG string.
pub fn encode_base64_jpeg(image: &DynamicImage) -> Result<String, AnalysisError> {
    encode_jpeg(image).map(|bytes| BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_encode_jpeg_magic() {
        let img = DynamicImage::new_rgb8(32, 16);
        let bytes = encode_jpeg(&img).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_encode_rgba_flattens_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(1, 1));
        let encoded = encode_base64_jpeg(&img).unwrap();
        // "/9j/" is the base64 form of the JPEG SOI marker
        assert!(encoded.starts_with("/9j/"));
    }

    #[test]
    fn test_base64_round_trips_to_decodable_image() {
        let img = DynamicImage::new_rgb8(40, 30);
        let encoded = encode_base64_jpeg(&img).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }
}
