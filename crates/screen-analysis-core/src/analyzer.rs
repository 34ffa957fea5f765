//! Request routing: validate, decode, dispatch, time.

use std::time::Instant;

use crate::backend::{BackendSet, CaptionRequest};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::pipeline::{encode_base64_jpeg, ImageDecoder};
use crate::types::{AnalysisRequest, AnalysisResponse, Backend};

/// Routes analysis requests to the configured backends.
pub struct Analyzer {
    decoder: ImageDecoder,
    backends: BackendSet,
}

impl Analyzer {
    /// Build an analyzer from configuration. Backends are created but the
    /// local model is not loaded.
    pub fn new(config: &Config) -> Self {
        Self {
            decoder: ImageDecoder::new(config.limits.clone()),
            backends: BackendSet::from_config(config),
        }
    }

    /// Access the backends (availability checks, preloading).
    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Analyze one image.
    ///
    /// The backend name is checked before the image is decoded, so an
    /// unknown backend is reported even when the image is also bad.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let AnalysisRequest {
            image,
            prompt,
            backend,
            model,
        } = request;

        let backend: Backend = backend.parse()?;
        let decoded = self.decoder.decode_base64(image).await?;
        tracing::info!(
            "Analyzing {}x{} image with {}",
            decoded.width,
            decoded.height,
            backend
        );

        let adapter = self.backends.get(backend);
        let start = Instant::now();
        let caption = adapter
            .caption(CaptionRequest {
                image: decoded.image,
                prompt,
                model,
            })
            .await;
        let processing_time = start.elapsed().as_secs_f64();

        match caption {
            Ok(caption) => {
                tracing::info!(
                    "{} ({}) answered in {:.2}s",
                    backend,
                    caption.model,
                    processing_time
                );
                Ok(AnalysisResponse {
                    analysis: caption.text,
                    backend,
                    model: caption.model,
                    processing_time,
                })
            }
            Err(e) => {
                tracing::warn!("{} failed after {:.2}s: {}", backend, processing_time, e);
                Err(e)
            }
        }
    }

    /// Analyze raw uploaded bytes.
    ///
    /// The upload is decoded, flattened to RGB, re-encoded as base64 JPEG
    /// and sent through [`Analyzer::analyze`], so uploads and JSON requests
    /// take the same path.
    pub async fn analyze_upload(
        &self,
        bytes: Vec<u8>,
        prompt: String,
        backend: String,
        model: Option<String>,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let decoded = self.decoder.decode_bytes(bytes).await?;
        let image = tokio::task::spawn_blocking(move || encode_base64_jpeg(&decoded.image))
            .await
            .map_err(|e| AnalysisError::Internal(format!("Encode task join error: {e}")))??;

        self.analyze(AnalysisRequest {
            image,
            prompt,
            backend,
            model,
        })
        .await
    }
}
