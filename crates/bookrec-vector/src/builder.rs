use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;

use bookrec_core::config::IndexSettings;
use bookrec_core::traits::{CorpusSource, Embedder};
use bookrec_core::types::CorpusItem;
use bookrec_core::{Result, RetrievalError};

use crate::corpus::Corpus;
use crate::ivf::{ApproxIndex, IvfParams};
use crate::similarity::is_finite;
use crate::store::VectorStore;

/// Builds the corpus and both rankers from a corpus source.
///
/// Items with a precomputed embedding are taken as-is; the rest are embedded
/// from `processed_text` in batches. Any collaborator failure or wrong-sized
/// vector aborts the whole build. The same source and embedder always produce
/// the same corpus and the same index.
pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    params: IvfParams,
    batch_size: usize,
    show_progress: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder, params: IvfParams::default(), batch_size: 64, show_progress: false }
    }

    pub fn from_settings(embedder: &'a dyn Embedder, settings: &IndexSettings) -> Self {
        Self::new(embedder).with_params(IvfParams::from_settings(settings)).with_batch_size(settings.embed_batch_size)
    }

    pub fn with_params(mut self, params: IvfParams) -> Self { self.params = params; self }
    pub fn with_batch_size(mut self, batch_size: usize) -> Self { self.batch_size = batch_size.max(1); self }
    pub fn with_progress(mut self, show: bool) -> Self { self.show_progress = show; self }

    pub fn params(&self) -> &IvfParams { &self.params }
    pub fn embedder(&self) -> &'a dyn Embedder { self.embedder }

    pub fn build<S: CorpusSource + ?Sized>(&self, source: &S) -> Result<(VectorStore, ApproxIndex)> {
        let corpus = self.build_corpus(source)?;
        Ok(self.index_corpus(corpus))
    }

    /// Wrap an already built (or loaded) corpus into both rankers.
    pub fn index_corpus(&self, corpus: Corpus) -> (VectorStore, ApproxIndex) {
        let corpus = Arc::new(corpus);
        let index = ApproxIndex::build(Arc::clone(&corpus), &self.params);
        tracing::info!(books = corpus.len(), dim = corpus.dim(), cells = index.num_partitions(), "corpus indexed");
        (VectorStore::new(corpus), index)
    }

    pub fn build_corpus<S: CorpusSource + ?Sized>(&self, source: &S) -> Result<Corpus> {
        let items = source.items().map_err(RetrievalError::corpus)?;
        let dim = self.embedder.dim();
        check_unique_ids(&items)?;

        let missing: Vec<usize> = items.iter().enumerate().filter(|(_, it)| it.embedding.is_none()).map(|(i, _)| i).collect();
        tracing::info!(books = items.len(), to_embed = missing.len(), embedder = self.embedder.embedder_id(), "building corpus");

        let mut generated: Vec<Option<Vec<f32>>> = vec![None; items.len()];
        let pb = self.progress_bar(missing.len());
        for batch in missing.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| items[i].record.processed_text.clone()).collect();
            let vectors = self.embedder.embed_many(&texts).map_err(RetrievalError::embedding)?;
            if vectors.len() != texts.len() {
                return Err(RetrievalError::Embedding(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
            }
            for (&i, v) in batch.iter().zip(vectors) {
                generated[i] = Some(v);
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        let mut rows = Vec::with_capacity(items.len());
        for (item, generated) in items.into_iter().zip(generated) {
            let vector = match (item.embedding, generated) {
                (Some(v), _) | (None, Some(v)) => v,
                (None, None) => return Err(RetrievalError::Embedding(format!("no vector for book '{}'", item.record.id))),
            };
            if vector.len() != dim {
                return Err(RetrievalError::Embedding(format!(
                    "book '{}': expected {} dimensions, got {}",
                    item.record.id,
                    dim,
                    vector.len()
                )));
            }
            if !is_finite(&vector) {
                return Err(RetrievalError::Embedding(format!("book '{}': vector has non-finite components", item.record.id)));
            }
            rows.push((item.record, vector));
        }
        Corpus::new(dim, rows)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress || len == 0 {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} books ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("embedding");
        pb
    }
}

fn check_unique_ids(items: &[CorpusItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.record.id.as_str()) {
            return Err(RetrievalError::InvalidArgument(format!("duplicate book id '{}'", item.record.id)));
        }
    }
    Ok(())
}
