//! In-process screen captioning with Pix2Struct (screen2words).
//!
//! The model is an owned, lazily initialised resource: it loads on the first
//! request (or at startup with `local.preload`), stays resident afterwards,
//! and a failed load is retried on the next request.
//!
//! # Usage
//!
//! ```rust,ignore
//! use screen_analysis_core::backend::LocalModelBackend;
//! use screen_analysis_core::Config;
//!
//! let config = Config::default();
//! let backend = LocalModelBackend::new(&config);
//! backend.preload().await?;
//! ```
//!
//! Expected files under `{model_dir}/{model}/`: `encoder_model.onnx`,
//! `decoder_model.onnx`, `tokenizer.json`.

pub(crate) mod preprocess;
pub(crate) mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::provider::{Caption, CaptionBackend, CaptionRequest};
use crate::config::{Config, LocalConfig};
use crate::error::AnalysisError;
use crate::pipeline::Normalizer;
use crate::types::Backend;

pub use self::preprocess::{extract_flattened_patches, patch_grid, FlattenedPatches, PATCH_DIM};
pub use self::session::{Pix2StructModel, DECODER_FILENAME, ENCODER_FILENAME, TOKENIZER_FILENAME};

/// Local captioning backend.
pub struct LocalModelBackend {
    settings: LocalConfig,
    model_path: PathBuf,
    normalizer: Normalizer,
    model: OnceCell<Arc<Pix2StructModel>>,
}

impl LocalModelBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.local.clone(),
            model_path: config.local_model_path(),
            normalizer: Normalizer::new(config.limits.max_pixels),
            model: OnceCell::new(),
        }
    }

    /// Directory the model files are read from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether the model is already resident in memory.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model now instead of on the first request.
    pub async fn preload(&self) -> Result<(), AnalysisError> {
        self.model().await.map(|_| ())
    }

    /// Get the resident model, loading it on first use.
    ///
    /// Concurrent first requests wait on the same load. Errors are not
    /// cached, so a later request tries again.
    async fn model(&self) -> Result<Arc<Pix2StructModel>, AnalysisError> {
        self.model
            .get_or_try_init(|| async {
                let path = self.model_path.clone();
                let device = self.settings.device.clone();
                tracing::info!("Loading Screen2Words model from {:?}", path);

                let model = tokio::task::spawn_blocking(move || Pix2StructModel::load(&path, &device))
                    .await
                    .map_err(|e| AnalysisError::Internal(format!("Model load task join error: {e}")))??;

                tracing::info!("Screen2Words model loaded successfully");
                Ok(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl CaptionBackend for LocalModelBackend {
    fn kind(&self) -> Backend {
        Backend::LocalModel
    }

    fn default_model(&self) -> &str {
        &self.settings.model
    }

    async fn is_available(&self) -> bool {
        self.is_loaded() || Pix2StructModel::files_exist(&self.model_path)
    }

    async fn caption(&self, request: CaptionRequest) -> Result<Caption, AnalysisError> {
        if let Some(model) = &request.model {
            if model != &self.settings.model {
                tracing::debug!(
                    "Ignoring model override {model:?}; local backend serves {:?}",
                    self.settings.model
                );
            }
        }

        let model = self.model().await?;
        let normalizer = self.normalizer;
        let max_patches = self.settings.max_patches;
        let max_new_tokens = self.settings.max_new_tokens;
        let CaptionRequest { image, prompt, .. } = request;

        let text = tokio::task::spawn_blocking(move || {
            let resized = normalizer.normalize(image);
            let inputs = extract_flattened_patches(&resized, max_patches);
            tracing::info!(
                "Prepared {} patches ({}x{}) for Screen2Words",
                inputs.num_patches(),
                inputs.rows,
                inputs.cols
            );
            model.generate(&inputs, &prompt, max_new_tokens)
        })
        .await
        .map_err(|e| AnalysisError::Internal(format!("Inference task join error: {e}")))?
        .map_err(|e| match e {
            AnalysisError::Model { message } => AnalysisError::Model {
                message: format!("Error in Screen2Words analysis: {message}"),
            },
            other => other,
        })?;

        tracing::info!("Got response from Screen2Words");
        Ok(Caption {
            text,
            model: self.settings.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn config_with_model_dir(dir: &Path) -> Config {
        let mut config = Config::default();
        config.local.model_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_model_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalModelBackend::new(&config_with_model_dir(dir.path()));
        assert_eq!(
            backend.model_path(),
            dir.path().join("pix2struct-screen2words-base")
        );
        assert_eq!(backend.default_model(), "pix2struct-screen2words-base");
        assert_eq!(backend.kind(), Backend::LocalModel);
    }

    #[tokio::test]
    async fn test_missing_model_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalModelBackend::new(&config_with_model_dir(dir.path()));
        assert!(!backend.is_available().await);

        let err = backend
            .caption(CaptionRequest {
                image: DynamicImage::new_rgb8(8, 8),
                prompt: "Describe this screen".to_string(),
                model: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Model { .. }));
        assert!(!err.is_client_error());
        assert!(!backend.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_preload_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalModelBackend::new(&config_with_model_dir(dir.path()));
        assert!(backend.preload().await.is_err());
        // Not cached: the second attempt runs the loader again and fails the same way.
        let err = backend.preload().await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
