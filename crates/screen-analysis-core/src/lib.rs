//! Screen Analysis Core - image captioning behind pluggable backends.
//!
//! Takes an image and a prompt, bounds the image to a pixel budget, and asks
//! one of two backends to describe it: an Ollama-compatible LLM server or an
//! in-process Pix2Struct screen captioning model.
//!
//! # Architecture
//!
//! ```text
//! Request → Decode → Route (Backend) → Normalize → Adapter → Text → Response
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use screen_analysis_core::{AnalysisRequest, Analyzer, Config};
//!
//! #[tokio::main]
//! async fn main() -> screen_analysis_core::Result<()> {
//!     let config = Config::default();
//!     let analyzer = Analyzer::new(&config);
//!
//!     let response = analyzer.analyze(AnalysisRequest::new(base64_png)).await?;
//!     println!("{}", response.analysis);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod analyzer;
pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use analyzer::Analyzer;
pub use backend::{BackendSet, CaptionBackend};
pub use config::Config;
pub use error::{AnalysisError, ConfigError, Result};
pub use pipeline::{ImageDecoder, Normalizer};
pub use types::{AnalysisRequest, AnalysisResponse, Backend, DEFAULT_PROMPT};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
