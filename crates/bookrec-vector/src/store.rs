use std::sync::Arc;

use bookrec_core::types::{BookRecord, RankedHit};
use bookrec_core::Result;

use crate::corpus::Corpus;
use crate::similarity::{check_query, checked_k, cosine_with_norms, l2_norm, top_k};

/// Exact (brute-force) cosine ranking over the whole corpus. Read-only after
/// construction; cheap to clone.
#[derive(Debug, Clone)]
pub struct VectorStore {
    corpus: Arc<Corpus>,
}

impl VectorStore {
    pub fn new(corpus: Arc<Corpus>) -> Self { Self { corpus } }

    pub fn corpus(&self) -> &Arc<Corpus> { &self.corpus }
    pub fn len(&self) -> usize { self.corpus.len() }
    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }
    pub fn dim(&self) -> usize { self.corpus.dim() }
    pub fn record(&self, position: usize) -> Option<&BookRecord> { self.corpus.record(position) }
    pub fn ids(&self) -> Vec<String> { self.corpus.ids().map(str::to_string).collect() }

    /// Top `k` records by cosine similarity to `query`, ties broken by corpus
    /// position. `k == 0` returns immediately without scoring.
    pub fn rank_exact(&self, query: &[f32], k: i64) -> Result<Vec<RankedHit>> {
        let k = checked_k(k)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        check_query(self.corpus.dim(), query)?;
        let q_norm = l2_norm(query);
        let scored: Vec<(usize, f32)> = (0..self.corpus.len())
            .map(|i| (i, cosine_with_norms(query, q_norm, self.corpus.vector(i), self.corpus.norm(i))))
            .collect();
        Ok(top_k(scored, k)
            .into_iter()
            .map(|(i, score)| RankedHit::from_record(&self.corpus.records()[i], score))
            .collect())
    }
}
