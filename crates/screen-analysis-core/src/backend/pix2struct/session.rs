//! Pix2Struct ONNX sessions and greedy decoding.
//!
//! Loads an encoder/decoder pair exported to ONNX (no KV cache) plus the
//! T5 tokenizer, and turns flattened patches into text one token at a time.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::Value;

use super::preprocess::{FlattenedPatches, PATCH_DIM};
use crate::error::AnalysisError;

/// Encoder ONNX filename.
pub const ENCODER_FILENAME: &str = "encoder_model.onnx";
/// Decoder ONNX filename.
pub const DECODER_FILENAME: &str = "decoder_model.onnx";
/// Tokenizer filename.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// T5 defaults, used when the tokenizer does not define the tokens.
const DEFAULT_PAD_ID: u32 = 0;
const DEFAULT_EOS_ID: u32 = 1;

/// Encoder and decoder sessions, locked together for a whole generation.
struct Sessions {
    encoder: Session,
    decoder: Session,
}

/// Input names detected from model metadata.
#[derive(Debug, Clone)]
struct InputNames {
    patches: String,
    patch_mask: String,
    decoder_ids: String,
    decoder_mask: Option<String>,
    hidden_states: String,
    hidden_mask: String,
}

/// A loaded Pix2Struct captioning model.
///
/// `Session::run` needs `&mut self`, and two requests interleaving inside one
/// generation would be wrong anyway, so one `Mutex` serializes generations.
pub struct Pix2StructModel {
    sessions: Mutex<Sessions>,
    names: InputNames,
    tokenizer: tokenizers::Tokenizer,
    pad_id: u32,
    eos_id: u32,
}

fn model_error(message: String) -> AnalysisError {
    AnalysisError::Model { message }
}

fn session_builder(device: &str) -> ort::Result<SessionBuilder> {
    let builder = Session::builder()?;

    #[cfg(feature = "cuda")]
    {
        if device != "cpu" {
            use ort::execution_providers::CUDAExecutionProvider;
            tracing::info!("Registering CUDA execution provider");
            return builder.with_execution_providers([CUDAExecutionProvider::default().build()]);
        }
    }
    #[cfg(not(feature = "cuda"))]
    {
        if device == "cuda" {
            tracing::warn!("CUDA requested but built without the `cuda` feature; using CPU");
        }
    }

    Ok(builder)
}

fn load_session(path: &Path, device: &str) -> Result<Session, AnalysisError> {
    session_builder(device)
        .map_err(|e| model_error(format!("Failed to create ONNX session builder: {e}")))?
        .commit_from_file(path)
        .map_err(|e| model_error(format!("Failed to load ONNX model {}: {e}", path.display())))
}

/// Pick the first input whose name contains `needle`, else `fallback`.
fn find_input(session: &Session, needle: &str, fallback: &str) -> String {
    session
        .inputs()
        .iter()
        .map(|i| i.name().to_string())
        .find(|name| name.contains(needle))
        .unwrap_or_else(|| fallback.to_string())
}

impl Pix2StructModel {
    /// Load the encoder, decoder and tokenizer from `model_dir`.
    pub fn load(model_dir: &Path, device: &str) -> Result<Self, AnalysisError> {
        for file in [ENCODER_FILENAME, DECODER_FILENAME, TOKENIZER_FILENAME] {
            let path = model_dir.join(file);
            if !path.exists() {
                return Err(model_error(format!(
                    "Failed to load Screen2Words model: {} not found. \
                     Run `screen-analysis models download` first.",
                    path.display()
                )));
            }
        }

        let encoder = load_session(&model_dir.join(ENCODER_FILENAME), device)?;
        let decoder = load_session(&model_dir.join(DECODER_FILENAME), device)?;

        let tokenizer = tokenizers::Tokenizer::from_file(model_dir.join(TOKENIZER_FILENAME))
            .map_err(|e| model_error(format!("Failed to load tokenizer: {e}")))?;
        let pad_id = tokenizer.token_to_id("<pad>").unwrap_or(DEFAULT_PAD_ID);
        let eos_id = tokenizer.token_to_id("</s>").unwrap_or(DEFAULT_EOS_ID);

        let decoder_mask = decoder
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .find(|name| name == "decoder_attention_mask");
        let names = InputNames {
            patches: find_input(&encoder, "flattened_patches", "flattened_patches"),
            patch_mask: find_input(&encoder, "attention_mask", "attention_mask"),
            decoder_ids: find_input(&decoder, "input_ids", "input_ids"),
            decoder_mask,
            hidden_states: find_input(&decoder, "encoder_hidden_states", "encoder_hidden_states"),
            hidden_mask: find_input(&decoder, "encoder_attention_mask", "encoder_attention_mask"),
        };

        tracing::debug!(
            "Loaded Pix2Struct model from {:?} (inputs: {:?}, pad={}, eos={})",
            model_dir,
            names,
            pad_id,
            eos_id
        );

        Ok(Self {
            sessions: Mutex::new(Sessions { encoder, decoder }),
            names,
            tokenizer,
            pad_id,
            eos_id,
        })
    }

    /// Token ids the decoder starts from: `<pad>` followed by the prompt
    /// tokens (no EOS), so the prompt conditions the generated text.
    pub fn decoder_prefix(&self, prompt: &str) -> Result<Vec<i64>, AnalysisError> {
        prefix_ids(&self.tokenizer, prompt, self.pad_id, self.eos_id)
    }

    /// Generate text for preprocessed patches.
    ///
    /// Runs the encoder once, then greedy-decodes until EOS or
    /// `max_new_tokens`. Only newly generated tokens are returned.
    pub fn generate(
        &self,
        inputs: &FlattenedPatches,
        prompt: &str,
        max_new_tokens: usize,
    ) -> Result<String, AnalysisError> {
        let max_patches = inputs.attention_mask.shape()[1];
        let mask: Vec<i64> = inputs.attention_mask.iter().copied().collect();
        let patches: Vec<f32> = inputs.patches.iter().copied().collect();

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| model_error(format!("Model lock poisoned: {e}")))?;

        // Encoder pass.
        let patches_value = Value::from_array((
            vec![1i64, max_patches as i64, PATCH_DIM as i64],
            patches,
        ))
        .map_err(|e| model_error(format!("Failed to create patches tensor: {e}")))?;
        let mask_value = Value::from_array((vec![1i64, max_patches as i64], mask.clone()))
            .map_err(|e| model_error(format!("Failed to create mask tensor: {e}")))?;

        let (hidden_shape, hidden) = {
            let outputs = sessions
                .encoder
                .run(ort::inputs![
                    self.names.patches.as_str() => patches_value,
                    self.names.patch_mask.as_str() => mask_value
                ])
                .map_err(|e| model_error(format!("Encoder inference failed: {e}")))?;

            let hidden_output = outputs
                .iter()
                .find(|(name, _)| *name == "last_hidden_state")
                .or_else(|| outputs.iter().next())
                .ok_or_else(|| model_error("Encoder produced no outputs".to_string()))?;
            let (shape, data) = hidden_output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| model_error(format!("Failed to extract encoder output: {e}")))?;
            (shape.to_vec(), data.to_vec())
        };

        let prefix = self.decoder_prefix(prompt)?;
        let decoder = &mut sessions.decoder;
        let generated = greedy_decode(prefix, self.eos_id, max_new_tokens, |ids| {
            let seq_len = ids.len() as i64;
            let ids_value = Value::from_array((vec![1i64, seq_len], ids.to_vec()))
                .map_err(|e| model_error(format!("Failed to create input_ids tensor: {e}")))?;
            let hidden_value = Value::from_array((hidden_shape.clone(), hidden.clone()))
                .map_err(|e| model_error(format!("Failed to create hidden state tensor: {e}")))?;
            let hidden_mask_value = Value::from_array((vec![1i64, max_patches as i64], mask.clone()))
                .map_err(|e| model_error(format!("Failed to create mask tensor: {e}")))?;

            let mut decoder_inputs = ort::inputs![
                self.names.decoder_ids.as_str() => ids_value,
                self.names.hidden_states.as_str() => hidden_value,
                self.names.hidden_mask.as_str() => hidden_mask_value
            ];
            if let Some(name) = &self.names.decoder_mask {
                let ones = Value::from_array((vec![1i64, seq_len], vec![1i64; ids.len()]))
                    .map_err(|e| model_error(format!("Failed to create decoder mask: {e}")))?;
                decoder_inputs.push((name.clone().into(), ones.into()));
            }

            let outputs = decoder
                .run(decoder_inputs)
                .map_err(|e| model_error(format!("Decoder inference failed: {e}")))?;
            let logits_output = outputs
                .iter()
                .find(|(name, _)| *name == "logits")
                .or_else(|| outputs.iter().next())
                .ok_or_else(|| model_error("Decoder produced no outputs".to_string()))?;
            let (shape, logits) = logits_output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| model_error(format!("Failed to extract logits: {e}")))?;

            let vocab = match shape.len() {
                3 => shape[2] as usize,
                _ => {
                    return Err(model_error(format!("Unexpected logits shape: {:?}", shape)));
                }
            };
            Ok(logits[logits.len() - vocab..].to_vec())
        })?;
        drop(sessions);

        decode_text(&self.tokenizer, &generated)
    }

    /// Check whether all model files exist in `model_dir`.
    pub fn files_exist(model_dir: &Path) -> bool {
        [ENCODER_FILENAME, DECODER_FILENAME, TOKENIZER_FILENAME]
            .iter()
            .all(|file| model_dir.join(file).exists())
    }
}

/// `pad_id` followed by the prompt's token ids with any `eos_id` removed.
fn prefix_ids(
    tokenizer: &tokenizers::Tokenizer,
    prompt: &str,
    pad_id: u32,
    eos_id: u32,
) -> Result<Vec<i64>, AnalysisError> {
    let mut ids = vec![pad_id as i64];
    if !prompt.trim().is_empty() {
        let encoding = tokenizer
            .encode(prompt, false)
            .map_err(|e| model_error(format!("Tokenization failed: {e}")))?;
        ids.extend(
            encoding
                .get_ids()
                .iter()
                .filter(|&&id| id != eos_id)
                .map(|&id| id as i64),
        );
    }
    Ok(ids)
}

/// Greedy decoding from `prefix`.
///
/// `next_logits` receives the whole sequence so far and returns the logits
/// for the last position. Stops at `eos_id` or after `max_new_tokens`
/// steps. Returns only the generated tokens, without the prefix or EOS.
fn greedy_decode<F>(
    prefix: Vec<i64>,
    eos_id: u32,
    max_new_tokens: usize,
    mut next_logits: F,
) -> Result<Vec<u32>, AnalysisError>
where
    F: FnMut(&[i64]) -> Result<Vec<f32>, AnalysisError>,
{
    let prefix_len = prefix.len();
    let mut ids = prefix;

    for _ in 0..max_new_tokens {
        let logits = next_logits(&ids)?;
        if logits.is_empty() {
            return Err(model_error("Decoder returned empty logits".to_string()));
        }
        let next = argmax(&logits) as u32;
        if next == eos_id {
            break;
        }
        ids.push(next as i64);
    }

    Ok(ids[prefix_len..].iter().map(|&id| id as u32).collect())
}

/// Detokenize generated ids, skipping special tokens.
fn decode_text(tokenizer: &tokenizers::Tokenizer, ids: &[u32]) -> Result<String, AnalysisError> {
    let text = tokenizer
        .decode(ids, true)
        .map_err(|e| model_error(format!("Failed to decode tokens: {e}")))?;
    Ok(text.trim().to_string())
}

/// Index of the largest value (first one on ties).
fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        })
        .0
}
