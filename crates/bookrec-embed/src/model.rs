//! Local XLM-RoBERTa embedder (BGE-M3 family) on candle.
//!
//! Expects `tokenizer.json`, `config.json` and either `model.safetensors` or
//! `pytorch_model.bin` in the model directory.

use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use bookrec_core::traits::Embedder;

use crate::pool::mean_pool_normalized;
use crate::tokenize::encode_batch;

/// Texts per forward pass.
const FORWARD_BATCH: usize = 16;

/// Metal when built with the `metal` feature and a GPU is present, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            tracing::info!("embedding device: Metal");
            return dev;
        }
    }
    tracing::info!("embedding device: CPU");
    Device::Cpu
}

pub struct LocalModelEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl LocalModelEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config_raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_raw)?;
        let dim = serde_json::from_str::<serde_json::Value>(&config_raw)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "model".to_string());
        let id = format!("local:{}:d{}", name, dim);
        tracing::info!(%id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: max_len.max(8), id })
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = encode_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros(input_ids.dims2()?, DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = mean_pool_normalized(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        ensure!(rows.len() == texts.len(), "model returned {} rows for {} texts", rows.len(), texts.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dim) {
            return Err(anyhow!("model produced {} dims, expected {}", bad.len(), self.dim));
        }
        tracing::debug!(texts = texts.len(), elapsed = ?start.elapsed(), "embedded batch");
        Ok(rows)
    }
}

impl Embedder for LocalModelEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(FORWARD_BATCH) {
            out.extend(self.forward_batch(chunk)?);
        }
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle).with_context(|| format!("reading {}", pickle.display()))?;
    Ok(weights.into_iter().collect())
}

/// Locate the model directory: `APP_MODEL_DIR`, then `MODEL_DIR`, then the
/// configured path.
pub fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { tracing::debug!(var, dir = %p.display(), "model dir from env"); return Ok(p); }
        }
    }
    if configured.exists() { return Ok(configured.to_path_buf()); }
    Err(anyhow!("Could not locate embedding model directory (tried {})", configured.display()))
}
