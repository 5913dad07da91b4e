use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use bookrec_core::traits::Embedder;

/// Feature-hashing embedder: each lowercase alphanumeric token lands in one
/// bucket with a hash-derived sign and weight, and the result is
/// L2-normalized. Deterministic and model-free, so builds and tests are
/// reproducible. Text without tokens maps to the zero vector.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:d{}", dim) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let sign = if (h >> 63) & 1 == 1 { -1.0 } else { 1.0 };
            let weight = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += sign * weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_one(t)).collect()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        assert!(e.embed_one("  ... ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn tokenization_ignores_case_and_punctuation() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_one("Dragons, Magic!"), e.embed_one("dragons magic"));
    }
}
