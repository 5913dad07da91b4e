use std::collections::HashSet;

use bookrec_core::types::BookRecord;
use bookrec_core::{Result, RetrievalError};

use crate::similarity::{is_finite, l2_norm};

/// The built corpus: records and their vectors in a row-major matrix, one row
/// per record, all rows `dim` wide. Positions are the join key between the
/// exact store and the IVF index, which share one `Arc<Corpus>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    records: Vec<BookRecord>,
    matrix: Vec<f32>,
    norms: Vec<f64>,
    dim: usize,
}

impl Corpus {
    pub fn new(dim: usize, rows: Vec<(BookRecord, Vec<f32>)>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());
        let mut matrix = Vec::with_capacity(rows.len() * dim);
        let mut norms = Vec::with_capacity(rows.len());
        for (record, vector) in rows {
            if vector.len() != dim {
                return Err(RetrievalError::DimensionMismatch { expected: dim, actual: vector.len() });
            }
            if !is_finite(&vector) {
                return Err(RetrievalError::InvalidArgument(format!("book '{}' has a non-finite vector component", record.id)));
            }
            if !seen.insert(record.id.clone()) {
                return Err(RetrievalError::InvalidArgument(format!("duplicate book id '{}'", record.id)));
            }
            norms.push(l2_norm(&vector));
            matrix.extend_from_slice(&vector);
            records.push(record);
        }
        Ok(Self { records, matrix, norms, dim })
    }

    pub fn empty(dim: usize) -> Self { Self { records: Vec::new(), matrix: Vec::new(), norms: Vec::new(), dim } }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn records(&self) -> &[BookRecord] { &self.records }
    pub fn record(&self, position: usize) -> Option<&BookRecord> { self.records.get(position) }
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ { self.records.iter().map(|r| r.id.as_str()) }

    /// Row `position`. Panics when out of range, like slice indexing.
    pub fn vector(&self, position: usize) -> &[f32] { &self.matrix[position * self.dim..(position + 1) * self.dim] }

    pub fn norm(&self, position: usize) -> f64 { self.norms[position] }

    pub fn rows(&self) -> impl Iterator<Item = (&BookRecord, &[f32])> + '_ {
        self.records.iter().enumerate().map(move |(i, r)| (r, self.vector(i)))
    }

    /// blake3 over dimension, ids and vector bytes in corpus order. Equal
    /// corpora (same order, same vectors) give equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.dim as u64).to_le_bytes());
        for (record, vector) in self.rows() {
            hasher.update(&(record.id.len() as u64).to_le_bytes());
            hasher.update(record.id.as_bytes());
            for x in vector { hasher.update(&x.to_le_bytes()); }
        }
        hasher.finalize().to_hex().to_string()
    }
}
