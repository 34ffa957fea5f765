//! Decoding strategies for Ollama `/api/generate` responses.
//!
//! Ollama answers either with a single JSON object (`stream: false`) or with
//! newline-delimited JSON chunks. Which one arrived is decided by the
//! `Content-Type` header, not by sniffing the body.

use futures_util::StreamExt;
use serde::Deserialize;

/// How a response body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// One JSON object with a `response` field
    Json,
    /// One JSON object per line; `response` fragments until `done: true`
    NdJson,
}

impl ResponseFormat {
    /// Pick a decoding strategy from a `Content-Type` header value.
    ///
    /// Anything that is not `application/json` is treated as a stream.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let is_json = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false);
        if is_json {
            ResponseFormat::Json
        } else {
            ResponseFormat::NdJson
        }
    }

    /// Decode a full response into its trimmed text.
    pub async fn read(self, response: reqwest::Response) -> Result<String, String> {
        match self {
            ResponseFormat::Json => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| format!("failed to read response body: {e}"))?;
                decode_json(&body)
            }
            ResponseFormat::NdJson => {
                let mut accumulator = NdJsonAccumulator::default();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| format!("failed to read response stream: {e}"))?;
                    accumulator.push(&chunk)?;
                    if accumulator.is_done() {
                        break;
                    }
                }
                accumulator.finish()
            }
        }
    }
}

/// One object of an Ollama generate response (whole or streamed).
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Decode a non-streaming JSON body. A missing `response` field yields "".
pub fn decode_json(body: &[u8]) -> Result<String, String> {
    let chunk: GenerateChunk =
        serde_json::from_slice(body).map_err(|e| format!("failed to parse response: {e}"))?;
    Ok(chunk.response.unwrap_or_default().trim().to_string())
}

/// Incremental NDJSON decoder that tolerates lines split across chunks.
#[derive(Debug, Default)]
pub struct NdJsonAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl NdJsonAccumulator {
    /// Feed the next chunk of bytes. Complete lines are decoded immediately.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), String> {
        if self.done {
            return Ok(());
        }
        self.pending.extend_from_slice(bytes);

        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.consume_line(&line)?;
            if self.done {
                self.pending.clear();
                break;
            }
        }
        Ok(())
    }

    /// Whether a `done: true` chunk has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush any trailing line without a newline and return the trimmed text.
    pub fn finish(mut self) -> Result<String, String> {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.consume_line(&rest)?;
        }
        Ok(self.text.trim().to_string())
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), String> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(());
        }
        let chunk: GenerateChunk = serde_json::from_slice(line)
            .map_err(|e| format!("failed to parse stream chunk: {e}"))?;
        if let Some(fragment) = chunk.response {
            self.text.push_str(&fragment);
        }
        if chunk.done {
            self.done = true;
        }
        Ok(())
    }
}
