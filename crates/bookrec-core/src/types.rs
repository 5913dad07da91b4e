//! Domain types shared by the index, the engine and the collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RetrievalError;

pub type BookId = String;

/// A book of the corpus.
///
/// - `id`: unique within one corpus
/// - `authors`: in the order the metadata lists them
/// - `description`: raw text as ingested, returned to callers
/// - `processed_text`: normalized text fed to the embedder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub description: String,
    pub processed_text: String,
}

/// One entry produced by a corpus source: the record plus an optional
/// precomputed embedding. Items without one are embedded at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusItem {
    #[serde(flatten)]
    pub record: BookRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CorpusItem {
    pub fn new(record: BookRecord) -> Self { Self { record, embedding: None } }

    pub fn with_embedding(record: BookRecord, embedding: Vec<f32>) -> Self {
        Self { record, embedding: Some(embedding) }
    }
}

/// A ranked recommendation. `score` is strategy-specific but higher is
/// always more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: BookId,
    pub title: String,
    pub authors: Vec<String>,
    pub description: String,
    pub score: f32,
}

impl RankedHit {
    pub fn from_record(record: &BookRecord, score: f32) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            description: record.description.clone(),
            score,
        }
    }
}

/// Ranking algorithm used to answer a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Brute-force cosine ranking over the whole corpus.
    Exact,
    /// Inverted-file index lookup.
    Approximate,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Exact, Strategy::Approximate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::Approximate => "approximate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Strategy {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "cosine" => Ok(Strategy::Exact),
            "approximate" | "approx" | "ivf" => Ok(Strategy::Approximate),
            _ => Err(RetrievalError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Lookup key of the query cache. Matching is exact on all three parts;
/// `query_text` is not normalized here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query_text: String,
    pub strategy: Strategy,
    pub k: usize,
}

impl CacheKey {
    pub fn new(query_text: impl Into<String>, strategy: Strategy, k: usize) -> Self {
        Self { query_text: query_text.into(), strategy, k }
    }
}
