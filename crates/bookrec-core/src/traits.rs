use crate::types::CorpusItem;

/// Text → vector collaborator. Every vector it returns must have `dim()`
/// components.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_many(texts) }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
}

/// Produces the ordered corpus for a build.
pub trait CorpusSource {
    fn items(&self) -> anyhow::Result<Vec<CorpusItem>>;
}

impl CorpusSource for Vec<CorpusItem> {
    fn items(&self) -> anyhow::Result<Vec<CorpusItem>> { Ok(self.clone()) }
}

impl CorpusSource for [CorpusItem] {
    fn items(&self) -> anyhow::Result<Vec<CorpusItem>> { Ok(self.to_vec()) }
}
