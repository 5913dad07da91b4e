//! Embedding collaborators for the retrieval core.
//!
//! `HashingEmbedder` is deterministic and needs no model files; the local
//! model embedder runs XLM-RoBERTa (BGE-M3) through candle. `APP_USE_FAKE_EMBEDDINGS=1`
//! forces the hashing embedder regardless of configuration.

use anyhow::Result;
use std::sync::Arc;

use bookrec_core::config::{expand_path, EmbeddingProvider, EmbeddingSettings};
use bookrec_core::traits::Embedder;

mod hashing;
mod model;
mod pool;
mod tokenize;

pub use hashing::HashingEmbedder;
pub use model::{resolve_model_dir, select_device, LocalModelEmbedder};
pub use pool::mean_pool_normalized;
pub use tokenize::{encode_batch, PAD_ID};

pub fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_embeddings_forced() || settings.provider == EmbeddingProvider::Hash {
        tracing::info!(dim = settings.dim, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(settings.dim)));
    }
    let dir = resolve_model_dir(&expand_path(&settings.model_dir))?;
    Ok(Arc::new(LocalModelEmbedder::load(&dir, settings.max_len)?))
}
