//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Maximum request body size in megabytes (JSON and multipart)
    pub max_body_mb: usize,

    /// Origins allowed to call the API from a browser; `"*"` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_mb: 32,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Filesystem locations for the web page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `index.html`
    pub templates_dir: PathBuf,

    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Limits applied to incoming images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Pixel budget; larger images are downscaled before any backend call
    pub max_pixels: u64,

    /// Maximum accepted width or height of a decoded image
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pixels: 1_800_000,
            max_image_dimension: 20_000,
            decode_timeout_ms: 5000,
        }
    }
}

/// Remote LLM (Ollama API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the Ollama server
    pub endpoint: String,

    /// Model used when the request does not name one
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            timeout_secs: 300,
        }
    }
}

/// In-process Pix2Struct captioning model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Model name; also the subdirectory of `model_dir` holding its files
    pub model: String,

    /// Directory where models are stored
    pub model_dir: PathBuf,

    /// Maximum number of 16x16 patches fed to the encoder
    pub max_patches: usize,

    /// Maximum number of tokens generated per request
    pub max_new_tokens: usize,

    /// Load the model at startup instead of on first request
    pub preload: bool,

    /// Execution device: "auto", "cpu" or "cuda"
    pub device: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model: "pix2struct-screen2words-base".to_string(),
            model_dir: PathBuf::from("~/.screen-analysis/models"),
            max_patches: 2048,
            max_new_tokens: 64,
            preload: false,
            device: "auto".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
