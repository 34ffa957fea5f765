//! Request and response types for image analysis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;

/// Prompt used when the caller does not provide one.
pub const DEFAULT_PROMPT: &str = "Analyze this screen capture and describe what you see in detail.";

/// The captioning backends a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// An Ollama-compatible LLM server reached over HTTP
    RemoteLlm,
    /// The Pix2Struct screen captioning model running in process
    LocalModel,
}

impl Backend {
    /// All supported backends, in display order.
    pub const ALL: [Backend; 2] = [Backend::RemoteLlm, Backend::LocalModel];

    /// Canonical wire name (`"remote-llm"` or `"local-model"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::RemoteLlm => "remote-llm",
            Backend::LocalModel => "local-model",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = AnalysisError;

    /// Parse a backend name, case-insensitively.
    ///
    /// Besides the canonical names, accepts the names the web page has always
    /// used: `ollama` and `screen2words`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-llm" | "ollama" => Ok(Backend::RemoteLlm),
            "local-model" | "screen2words" | "pix2struct" => Ok(Backend::LocalModel),
            _ => Err(AnalysisError::UnsupportedBackend(s.to_string())),
        }
    }
}

/// Body of `POST /api/analyze`.
///
/// `backend` stays a plain string so an unknown name is reported as an
/// unsupported backend rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Base64-encoded image bytes (a `data:` URL prefix is tolerated)
    pub image: String,

    /// Instructions for the captioning backend
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Backend name
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Model override for backends that support one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_backend() -> String {
    Backend::RemoteLlm.as_str().to_string()
}

impl AnalysisRequest {
    /// Build a request with the default prompt and backend.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            prompt: default_prompt(),
            backend: default_backend(),
            model: None,
        }
    }
}

/// Result of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Text generated by the backend
    pub analysis: String,

    /// Backend that produced the text
    pub backend: Backend,

    /// Model that produced the text
    pub model: String,

    /// Wall-clock time spent in the backend, in seconds
    pub processing_time: f64,
}
