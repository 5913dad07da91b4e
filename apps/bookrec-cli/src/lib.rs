//! Shared setup for the `bookrec-*` binaries.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bookrec_core::config::{expand_path, Settings};
use bookrec_core::corpus::JsonCorpusSource;
use bookrec_embed::default_embedder;
use bookrec_engine::RetrievalEngine;
use bookrec_vector::{load_or_build, open_db, IndexBuilder, SnapshotMeta};

/// Log to stderr, `RUST_LOG` filter, `info` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Overrides `data.corpus_path`.
    pub corpus_path: Option<PathBuf>,
    pub force_rebuild: bool,
    pub show_progress: bool,
}

/// Open the snapshot store, reuse or rebuild the active snapshot, and wrap
/// it in an engine.
pub fn load_engine(settings: &Settings, opts: &LoadOptions) -> Result<(RetrievalEngine, SnapshotMeta)> {
    let embedder = default_embedder(&settings.embedding)?;
    let corpus_path = opts.corpus_path.clone().unwrap_or_else(|| expand_path(&settings.data.corpus_path));
    let source = JsonCorpusSource::new(corpus_path);
    let snapshot_dir = expand_path(&settings.data.snapshot_dir);
    std::fs::create_dir_all(&snapshot_dir).with_context(|| format!("creating {}", snapshot_dir.display()))?;

    let builder = IndexBuilder::from_settings(&*embedder, &settings.index).with_progress(opts.show_progress);
    let rt = tokio::runtime::Runtime::new()?;
    let (store, index, meta) = rt.block_on(async {
        let conn = open_db(&snapshot_dir.to_string_lossy()).await?;
        load_or_build(&conn, &settings.data.table, &source, &builder, opts.force_rebuild).await
    })?;
    let engine = RetrievalEngine::new(store, index, Arc::clone(&embedder), settings.cache.capacity)?;
    Ok((engine, meta))
}

/// Parse the value following `args[*i]` and advance past it.
pub fn flag_value<T>(args: &[String], i: &mut usize, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = args.get(*i + 1).with_context(|| format!("{} requires a value", flag))?;
    *i += 1;
    raw.parse::<T>().map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", flag, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookrec_core::types::Strategy;

    #[test]
    fn flag_value_reads_and_advances() {
        let args: Vec<String> = ["--k", "5", "--k"].iter().map(|s| s.to_string()).collect();
        let mut i = 0;
        assert_eq!(flag_value::<i64>(&args, &mut i, "--k").unwrap(), 5);
        assert_eq!(i, 1);
        let mut i = 2;
        assert!(flag_value::<i64>(&args, &mut i, "--k").is_err());
    }

    #[test]
    fn engine_loads_from_json_corpus_and_snapshot_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let corpus = tmp.path().join("books.json");
        std::fs::write(
            &corpus,
            r#"[
                {"id":"1","title":"Whale","authors":["H"],"description":"a captain hunts a white whale","processed_text":"a captain hunts a white whale"},
                {"id":"2","title":"Garden","description":"vegetables in a small garden","processed_text":"vegetables in a small garden"}
            ]"#,
        )
        .unwrap();
        let mut settings = Settings::default();
        settings.embedding.dim = 32;
        settings.data.snapshot_dir = tmp.path().join("lancedb").to_string_lossy().into_owned();
        let opts = LoadOptions { corpus_path: Some(corpus), ..LoadOptions::default() };

        let (engine, meta) = load_engine(&settings, &opts).unwrap();
        assert_eq!(meta.books, 2);
        let hits = engine.recommend("white whale", Strategy::Exact, 1).unwrap();
        assert_eq!(hits[0].id, "1");

        let (_, reloaded) = load_engine(&settings, &opts).unwrap();
        assert_eq!(reloaded.table, meta.table);
    }
}
