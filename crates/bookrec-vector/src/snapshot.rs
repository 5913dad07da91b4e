//! LanceDB snapshots of built corpora.
//!
//! Each corpus is written once into a table named after its fingerprint
//! (`<table>_<fingerprint prefix>`); the `meta` key/value table then points
//! `active_snapshot:<table>` at it. Rebuilding an identical corpus reuses the
//! existing table, so the pointer flip is the only write.
//!
//! Loading reads rows back in `position` order and rebuilds the IVF cells from
//! the loaded corpus, which is deterministic for the same index parameters.

use anyhow::{anyhow, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use bookrec_core::traits::CorpusSource;
use bookrec_core::types::BookRecord;

use crate::builder::IndexBuilder;
use crate::corpus::Corpus;
use crate::ivf::ApproxIndex;
use crate::schema::{build_books_schema, build_meta_schema};
use crate::store::VectorStore;

pub const META_TABLE: &str = "meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub table: String,
    pub fingerprint: String,
    pub embedder_id: String,
    pub dim: usize,
    pub books: usize,
    pub built_at: String,
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

fn active_key(table: &str) -> String { format!("active_snapshot:{}", table) }

pub fn snapshot_table_name(table: &str, fingerprint: &str) -> String {
    let prefix = fingerprint.get(..16).unwrap_or(fingerprint);
    format!("{}_{}", table, prefix)
}

/// Persist `corpus` and mark it active for `table`.
pub async fn save_corpus(conn: &Connection, table: &str, corpus: &Corpus, embedder_id: &str) -> Result<SnapshotMeta> {
    let fingerprint = corpus.fingerprint();
    let name = snapshot_table_name(table, &fingerprint);
    if table_exists(conn, &name).await? {
        tracing::info!(table = %name, "snapshot already present, reusing");
    } else {
        let schema = build_books_schema(i32::try_from(corpus.dim())?);
        let batches = if corpus.is_empty() { Vec::new() } else { vec![Ok(corpus_to_record_batch(corpus)?)] };
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
        conn.create_table(&name, reader).execute().await?;
        tracing::info!(table = %name, books = corpus.len(), "snapshot written");
    }

    let meta = SnapshotMeta {
        table: name,
        fingerprint,
        embedder_id: embedder_id.to_string(),
        dim: corpus.dim(),
        books: corpus.len(),
        built_at: Utc::now().to_rfc3339(),
    };
    set_meta(conn, META_TABLE, &active_key(table), &serde_json::to_string(&meta)?).await?;
    Ok(meta)
}

pub async fn load_active_meta(conn: &Connection, table: &str) -> Result<Option<SnapshotMeta>> {
    match get_meta(conn, META_TABLE, &active_key(table)).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw).context("parsing snapshot metadata")?)),
        None => Ok(None),
    }
}

pub async fn load_corpus(conn: &Connection, meta: &SnapshotMeta) -> Result<Corpus> {
    let t = conn.open_table(&meta.table).execute().await?;
    let mut rows: Vec<(i64, BookRecord, Vec<f32>)> = Vec::with_capacity(meta.books);
    let mut stream = t.query().execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        let position = batch.column_by_name("position").and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| anyhow!("missing position"))?;
        let id = string_column(&batch, "id")?;
        let title = string_column(&batch, "title")?;
        let authors = string_column(&batch, "authors")?;
        let description = string_column(&batch, "description")?;
        let processed = string_column(&batch, "processed_text")?;
        let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("missing vector"))?;
        for i in 0..batch.num_rows() {
            if !vectors.is_valid(i) {
                return Err(anyhow!("book '{}' has no vector", id.value(i)));
            }
            let list = vectors.value(i);
            let vector = list.as_primitive::<arrow_array::types::Float32Type>().values().to_vec();
            let record = BookRecord {
                id: id.value(i).to_string(),
                title: title.value(i).to_string(),
                authors: serde_json::from_str(authors.value(i)).context("parsing authors")?,
                description: description.value(i).to_string(),
                processed_text: processed.value(i).to_string(),
            };
            rows.push((position.value(i), record, vector));
        }
    }
    rows.sort_by_key(|(p, _, _)| *p);
    let corpus = Corpus::new(meta.dim, rows.into_iter().map(|(_, r, v)| (r, v)).collect())?;
    if corpus.fingerprint() != meta.fingerprint {
        return Err(anyhow!("snapshot {} does not match its recorded fingerprint", meta.table));
    }
    tracing::info!(table = %meta.table, books = corpus.len(), "snapshot loaded");
    Ok(corpus)
}

/// Reuse the active snapshot when it was produced by the same embedder,
/// otherwise build from `source` and save. `force_rebuild` skips the lookup.
pub async fn load_or_build<S: CorpusSource + ?Sized>(
    conn: &Connection,
    table: &str,
    source: &S,
    builder: &IndexBuilder<'_>,
    force_rebuild: bool,
) -> Result<(VectorStore, ApproxIndex, SnapshotMeta)> {
    let embedder = builder.embedder();
    if !force_rebuild {
        if let Some(meta) = load_active_meta(conn, table).await? {
            if meta.embedder_id == embedder.embedder_id() && meta.dim == embedder.dim() && table_exists(conn, &meta.table).await? {
                let corpus = load_corpus(conn, &meta).await?;
                let (store, index) = builder.index_corpus(corpus);
                return Ok((store, index, meta));
            }
            tracing::info!(active = %meta.embedder_id, current = embedder.embedder_id(), "snapshot stale, rebuilding");
        }
    }
    let corpus = builder.build_corpus(source)?;
    let meta = save_corpus(conn, table, &corpus, embedder.embedder_id()).await?;
    let (store, index) = builder.index_corpus(corpus);
    Ok((store, index, meta))
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("missing {} column", name))
}

fn corpus_to_record_batch(corpus: &Corpus) -> Result<RecordBatch> {
    let dim = i32::try_from(corpus.dim())?;
    let mut positions = Vec::with_capacity(corpus.len());
    let mut ids = Vec::with_capacity(corpus.len());
    let mut titles = Vec::with_capacity(corpus.len());
    let mut authors = Vec::with_capacity(corpus.len());
    let mut descriptions = Vec::with_capacity(corpus.len());
    let mut processed = Vec::with_capacity(corpus.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(corpus.len());
    for (i, (record, vector)) in corpus.rows().enumerate() {
        positions.push(i as i64);
        ids.push(record.id.clone());
        titles.push(record.title.clone());
        authors.push(serde_json::to_string(&record.authors)?);
        descriptions.push(record.description.clone());
        processed.push(record.processed_text.clone());
        vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        build_books_schema(dim),
        vec![
            Arc::new(Int64Array::from(positions)),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(authors)),
            Arc::new(StringArray::from(descriptions)),
            Arc::new(StringArray::from(processed)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(batch)
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    if !table_exists(conn, table).await? {
        let iter = RecordBatchIterator::new(vec![].into_iter(), build_meta_schema());
        conn.create_table(table, Box::new(iter)).execute().await?;
    }
    let t = conn.open_table(table).execute().await?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // key is unique: update in place or insert
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    let _ = mi.execute(reader).await?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table).await? { return Ok(None); }
    let t = conn.open_table(table).execute().await?;
    let mut stream = t.query().only_if(format!("key = '{}'", key.replace('\'', "''"))).execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        if batch.num_rows() == 0 { continue; }
        let val = string_column(&batch, "value")?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}
