use std::sync::Arc;

use bookrec_core::config::Settings;
use bookrec_core::traits::{CorpusSource, Embedder};
use bookrec_core::types::{CacheKey, RankedHit, Strategy};
use bookrec_core::{Result, RetrievalError};
use bookrec_vector::similarity::is_finite;
use bookrec_vector::{ApproxIndex, IndexBuilder, VectorStore};

use crate::cache::{CacheStats, QueryCache};

/// Answers "books like this description" with either ranking strategy.
///
/// The store and the index are immutable and share one corpus; the query
/// cache is the only shared mutable state, so `&RetrievalEngine` can be used
/// from many threads at once.
pub struct RetrievalEngine {
    store: VectorStore,
    index: ApproxIndex,
    embedder: Arc<dyn Embedder>,
    cache: QueryCache<CacheKey, Vec<RankedHit>>,
}

impl RetrievalEngine {
    pub fn new(store: VectorStore, index: ApproxIndex, embedder: Arc<dyn Embedder>, cache_capacity: usize) -> Result<Self> {
        if store.len() != index.len() || !store.corpus().ids().eq(index.corpus().ids()) {
            return Err(RetrievalError::InvalidArgument("store and index were built from different corpora".to_string()));
        }
        if embedder.dim() != store.dim() {
            return Err(RetrievalError::DimensionMismatch { expected: store.dim(), actual: embedder.dim() });
        }
        Ok(Self { store, index, embedder, cache: QueryCache::new(cache_capacity) })
    }

    /// Build store and index from `source` with `settings.index`, then wrap them.
    pub fn build<S: CorpusSource + ?Sized>(source: &S, embedder: Arc<dyn Embedder>, settings: &Settings) -> Result<Self> {
        let (store, index) = IndexBuilder::from_settings(embedder.as_ref(), &settings.index).build(source)?;
        Self::new(store, index, embedder, settings.cache.capacity)
    }

    pub fn store(&self) -> &VectorStore { &self.store }
    pub fn index(&self) -> &ApproxIndex { &self.index }
    pub fn embedder_id(&self) -> &str { self.embedder.embedder_id() }
    pub fn cache_stats(&self) -> CacheStats { self.cache.stats() }

    /// Top `k` books for `description`. `k == 0` returns an empty list without
    /// embedding or touching the cache.
    pub fn recommend(&self, description: &str, strategy: Strategy, k: i64) -> Result<Vec<RankedHit>> {
        let k = match usize::try_from(k) {
            Ok(0) => return Ok(Vec::new()),
            Ok(k) => k,
            Err(_) => {
                tracing::warn!(k, "rejected negative k");
                return Err(RetrievalError::InvalidArgument(format!("k must be >= 0, got {}", k)));
            }
        };
        if description.trim().is_empty() {
            tracing::warn!("rejected empty description");
            return Err(RetrievalError::InvalidArgument("description must not be empty".to_string()));
        }
        tracing::debug!(%strategy, k, chars = description.len(), "recommend");

        let key = CacheKey::new(description, strategy, k);
        let result = self.cache.get_or_compute(key, || self.rank(description, strategy, k));
        if let Err(err) = &result {
            tracing::warn!(%strategy, k, error = %err, "recommend failed");
        }
        result
    }

    /// Like [`recommend`](Self::recommend) with the strategy given by name
    /// (`exact`, `approximate`, or an alias).
    pub fn recommend_named(&self, description: &str, strategy: &str, k: i64) -> Result<Vec<RankedHit>> {
        let strategy: Strategy = strategy.parse()?;
        self.recommend(description, strategy, k)
    }

    fn rank(&self, description: &str, strategy: Strategy, k: usize) -> Result<Vec<RankedHit>> {
        let query = self.embedder.embed(description).map_err(RetrievalError::embedding)?;
        if !is_finite(&query) {
            return Err(RetrievalError::Embedding("query vector has non-finite components".to_string()));
        }
        let k = k as i64;
        match strategy {
            Strategy::Exact => self.store.rank_exact(&query, k),
            Strategy::Approximate => Ok(self.index.rank_approx(&query, k)?.into_iter().map(|(hit, _)| hit).collect()),
        }
    }
}
