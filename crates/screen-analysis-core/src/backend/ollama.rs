//! Remote LLM backend speaking the Ollama HTTP API.
//!
//! Each call normalizes the image, ships it as base64 JPEG to
//! `/api/generate`, and decodes either a JSON or an NDJSON answer.
//! No authentication, no retries.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::provider::{Caption, CaptionBackend, CaptionRequest};
use super::response::ResponseFormat;
use crate::config::RemoteConfig;
use crate::error::{error_chain, AnalysisError};
use crate::pipeline::{encode_base64_jpeg, Normalizer};
use crate::types::Backend;

/// Ollama backend.
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    timeout: Duration,
    normalizer: Normalizer,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &RemoteConfig, normalizer: Normalizer) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            normalizer,
            client: reqwest::Client::new(),
        }
    }

    /// Full URL of the generate endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn error(message: String) -> AnalysisError {
        AnalysisError::Backend {
            backend: Backend::RemoteLlm,
            message,
        }
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[async_trait]
impl CaptionBackend for OllamaBackend {
    fn kind(&self) -> Backend {
        Backend::RemoteLlm
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn caption(&self, request: CaptionRequest) -> Result<Caption, AnalysisError> {
        let CaptionRequest {
            image,
            prompt,
            model,
        } = request;
        let model = model.unwrap_or_else(|| self.model.clone());
        let normalizer = self.normalizer;

        let image_base64 = tokio::task::spawn_blocking(move || {
            let resized = normalizer.normalize(image);
            encode_base64_jpeg(&resized)
        })
        .await
        .map_err(|e| AnalysisError::Internal(format!("Encode task join error: {e}")))??;

        let body = GenerateRequest {
            model: &model,
            prompt: &prompt,
            stream: false,
            images: vec![image_base64],
        };

        let start = Instant::now();
        let url = self.generate_url();
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Error communicating with Ollama: {}", error_chain(&e));
                tracing::error!("{message}");
                Self::error(message)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = format!("Error communicating with Ollama: HTTP {status}: {text}");
            tracing::error!("{message}");
            return Err(Self::error(message));
        }
        tracing::info!("Got response from Ollama ({} ms)", start.elapsed().as_millis());

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let format = ResponseFormat::from_content_type(content_type.as_deref());

        let text = format.read(resp).await.map_err(|e| {
            let message = format!("Error communicating with Ollama: {e}");
            tracing::error!("{message}");
            Self::error(message)
        })?;

        if text.is_empty() {
            tracing::warn!("Ollama returned an empty response for model {model}");
        }
        tracing::debug!("Parsed {:?} response from Ollama", format);

        Ok(Caption { text, model })
    }
}
