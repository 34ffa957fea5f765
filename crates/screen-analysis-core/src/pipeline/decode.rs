//! Image decoding from base64 payloads and raw uploads, with format
//! detection, dimension validation, and timeout support.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::AnalysisError;

/// Image decoder with configurable limits and timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Size of the encoded image in bytes
    pub byte_len: usize,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode a base64 payload (optionally a `data:` URL) into an image.
    pub async fn decode_base64(&self, payload: String) -> Result<DecodedImage, AnalysisError> {
        self.decode_with(move || {
            let bytes = decode_payload(&payload)?;
            Self::decode_bytes_sync(bytes)
        })
        .await
    }

    /// Decode raw image bytes (e.g. a multipart upload) into an image.
    pub async fn decode_bytes(&self, bytes: Vec<u8>) -> Result<DecodedImage, AnalysisError> {
        self.decode_with(move || Self::decode_bytes_sync(bytes))
            .await
    }

    /// Run a decode closure on the blocking pool under the decode timeout,
    /// then enforce the dimension limit.
    async fn decode_with<F>(&self, decode: F) -> Result<DecodedImage, AnalysisError>
    where
        F: FnOnce() -> Result<DecodedImage, AnalysisError> + Send + 'static,
    {
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, tokio::task::spawn_blocking(decode)).await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                let max_dim = self.limits.max_image_dimension;
                if decoded.width > max_dim || decoded.height > max_dim {
                    return Err(AnalysisError::InvalidImage(format!(
                        "image is {}x{}, larger than the {max_dim}px limit",
                        decoded.width, decoded.height
                    )));
                }
                tracing::debug!(
                    "Decoded {:?} image {}x{} ({} bytes)",
                    decoded.format,
                    decoded.width,
                    decoded.height,
                    decoded.byte_len
                );
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(AnalysisError::Internal(format!(
                "Decode task join error: {e}"
            ))),
            Err(_) => Err(AnalysisError::Timeout {
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>) -> Result<DecodedImage, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::InvalidImage("empty image payload".to_string()));
        }

        let byte_len = bytes.len();
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AnalysisError::InvalidImage(format!("cannot detect image format: {e}")))?;
        let format = reader.format().ok_or_else(|| {
            AnalysisError::InvalidImage("unrecognized image format".to_string())
        })?;
        let image = reader
            .decode()
            .map_err(|e| AnalysisError::InvalidImage(e.to_string()))?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            byte_len,
        })
    }
}

/// Decode a base64 payload, stripping whitespace and any `data:*;base64,` prefix.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, AnalysisError> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AnalysisError::InvalidImage("malformed data URL".to_string()))?,
        None => trimmed,
    };

    // Line-wrapped base64 is common in pasted payloads.
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| AnalysisError::InvalidImage(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 transparent PNG.
    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[tokio::test]
    async fn test_decode_base64_png() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let decoded = decoder.decode_base64(PIXEL_PNG.to_string()).await.unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (1, 1));
    }

    #[tokio::test]
    async fn test_decode_data_url() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let payload = format!("data:image/png;base64,{PIXEL_PNG}");
        let decoded = decoder.decode_base64(payload).await.unwrap();
        assert_eq!((decoded.width, decoded.height), (1, 1));
    }

    #[tokio::test]
    async fn test_decode_rejects_malformed_base64() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode_base64("not base64 at all!!".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(_)));
        assert!(err.to_string().starts_with("Invalid image data: invalid base64"));
    }

    #[tokio::test]
    async fn test_decode_rejects_non_image_bytes() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let payload = BASE64.encode(b"hello, world");
        let err = decoder.decode_base64(payload).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn test_decode_rejects_empty_upload() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder.decode_bytes(Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("empty image payload"));
    }

    #[tokio::test]
    async fn test_decode_enforces_dimension_limit() {
        let limits = LimitsConfig {
            max_image_dimension: 10,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);

        let mut png = Vec::new();
        DynamicImage::new_rgb8(20, 5)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let err = decoder.decode_bytes(png).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("20x5"));
    }

    #[test]
    fn test_decode_payload_ignores_whitespace() {
        let (head, tail) = PIXEL_PNG.split_at(40);
        let bytes = decode_payload(&format!("  {head}\n{tail}\n")).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
