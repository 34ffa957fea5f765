//! Captioning backends.
//!
//! A closed set of backends (see [`Backend`]), each implementing the
//! [`CaptionBackend`] contract:
//! - **remote-llm**: an Ollama server over HTTP ([`OllamaBackend`])
//! - **local-model**: Pix2Struct via ONNX Runtime ([`LocalModelBackend`])

pub(crate) mod ollama;
pub(crate) mod pix2struct;
pub(crate) mod provider;
pub(crate) mod response;

pub use ollama::OllamaBackend;
pub use pix2struct::{
    extract_flattened_patches, patch_grid, FlattenedPatches, LocalModelBackend, Pix2StructModel,
    DECODER_FILENAME, ENCODER_FILENAME, PATCH_DIM, TOKENIZER_FILENAME,
};
pub use provider::{Caption, CaptionBackend, CaptionRequest};
pub use response::{NdJsonAccumulator, ResponseFormat};

use crate::config::Config;
use crate::pipeline::Normalizer;
use crate::types::Backend;

/// One instance of every backend, addressed by [`Backend`].
pub struct BackendSet {
    remote: OllamaBackend,
    local: LocalModelBackend,
}

impl BackendSet {
    /// Build every backend from configuration. Nothing is loaded or contacted yet.
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote: OllamaBackend::new(&config.remote, Normalizer::new(config.limits.max_pixels)),
            local: LocalModelBackend::new(config),
        }
    }

    /// The capability serving a backend variant.
    pub fn get(&self, backend: Backend) -> &dyn CaptionBackend {
        match backend {
            Backend::RemoteLlm => &self.remote,
            Backend::LocalModel => &self.local,
        }
    }

    /// The local model backend (for preloading).
    pub fn local(&self) -> &LocalModelBackend {
        &self.local
    }
}
