//! In-memory IVF (inverted file) index.
//!
//! Build: spherical k-means over unit-normalized rows partitions the corpus
//! into `nlist` cells; each cell keeps the positions assigned to it.
//! Query: rank cells by centroid similarity, scan the best `nprobes` cells
//! (more if they hold fewer than `k` rows), re-score candidates with the exact
//! cosine kernel and keep the top `k`.
//!
//! Returned relevance scores are exact cosine similarities, the same values the
//! exact store reports for the same rows. Only recall is approximate: a row in
//! an unprobed cell cannot be returned.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use bookrec_core::config::IndexSettings;
use bookrec_core::types::RankedHit;
use bookrec_core::Result;

use crate::corpus::Corpus;
use crate::similarity::{check_query, checked_k, cosine_with_norms, dot, l2_norm, normalized, rank_order, top_k};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfParams {
    /// Number of cells; 0 picks round(sqrt(n)).
    pub num_partitions: usize,
    pub nprobes: usize,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for IvfParams {
    fn default() -> Self { Self::from_settings(&IndexSettings::default()) }
}

impl IvfParams {
    pub fn from_settings(settings: &IndexSettings) -> Self {
        Self {
            num_partitions: settings.num_partitions,
            nprobes: settings.nprobes.max(1),
            iterations: settings.kmeans_iterations,
            seed: settings.seed,
        }
    }

    /// Cell count for a corpus of `n` rows, clamped to `[1, n]`.
    pub fn partitions_for(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let wanted = if self.num_partitions > 0 { self.num_partitions } else { (n as f64).sqrt().round() as usize };
        wanted.clamp(1, n)
    }
}

#[derive(Debug, Clone)]
pub struct ApproxIndex {
    corpus: Arc<Corpus>,
    centroids: Vec<f32>,
    lists: Vec<Vec<usize>>,
    nprobes: usize,
}

impl ApproxIndex {
    pub fn build(corpus: Arc<Corpus>, params: &IvfParams) -> Self {
        let n = corpus.len();
        let dim = corpus.dim();
        let nlist = params.partitions_for(n);
        if nlist == 0 {
            return Self { corpus, centroids: Vec::new(), lists: Vec::new(), nprobes: params.nprobes.max(1) };
        }

        let units: Vec<Vec<f32>> = (0..n).map(|i| normalized(corpus.vector(i))).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut centroids: Vec<f32> = Vec::with_capacity(nlist * dim);
        for i in rand::seq::index::sample(&mut rng, n, nlist).into_vec() {
            centroids.extend_from_slice(&units[i]);
        }

        let mut assignment = assign(&units, &centroids, dim);
        for _ in 0..params.iterations {
            update_centroids(&units, &assignment, &mut centroids, dim);
            let next = assign(&units, &centroids, dim);
            if next == assignment {
                break;
            }
            assignment = next;
        }

        let mut lists = vec![Vec::new(); nlist];
        for (position, &cell) in assignment.iter().enumerate() {
            lists[cell].push(position);
        }
        tracing::debug!(rows = n, cells = nlist, "built IVF index");
        Self { corpus, centroids, lists, nprobes: params.nprobes.max(1) }
    }

    pub fn corpus(&self) -> &Arc<Corpus> { &self.corpus }
    pub fn len(&self) -> usize { self.corpus.len() }
    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }
    pub fn num_partitions(&self) -> usize { self.lists.len() }
    pub fn nprobes(&self) -> usize { self.nprobes }
    pub fn partition_sizes(&self) -> Vec<usize> { self.lists.iter().map(Vec::len).collect() }

    /// Approximate top `k`. Each hit's `score` equals the paired relevance.
    pub fn rank_approx(&self, query: &[f32], k: i64) -> Result<Vec<(RankedHit, f32)>> {
        let k = checked_k(k)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        check_query(self.corpus.dim(), query)?;
        if self.corpus.is_empty() {
            return Ok(Vec::new());
        }

        let dim = self.corpus.dim();
        let q_unit = normalized(query);
        let mut cells: Vec<(usize, f32)> = (0..self.lists.len())
            .map(|c| (c, dot(&q_unit, &self.centroids[c * dim..(c + 1) * dim]) as f32))
            .collect();
        cells.sort_by(rank_order);

        let q_norm = l2_norm(query);
        let mut scored = Vec::new();
        for (probed, (cell, _)) in cells.into_iter().enumerate() {
            if probed >= self.nprobes && scored.len() >= k {
                break;
            }
            for &i in &self.lists[cell] {
                scored.push((i, cosine_with_norms(query, q_norm, self.corpus.vector(i), self.corpus.norm(i))));
            }
        }

        Ok(top_k(scored, k)
            .into_iter()
            .map(|(i, score)| (RankedHit::from_record(&self.corpus.records()[i], score), score))
            .collect())
    }
}

/// Nearest centroid by dot product on unit vectors; ties go to the lower cell.
fn assign(units: &[Vec<f32>], centroids: &[f32], dim: usize) -> Vec<usize> {
    let nlist = centroids.len() / dim.max(1);
    units
        .iter()
        .map(|u| {
            let mut best = 0usize;
            let mut best_score = f64::NEG_INFINITY;
            for c in 0..nlist {
                let s = dot(u, &centroids[c * dim..(c + 1) * dim]);
                if s > best_score {
                    best = c;
                    best_score = s;
                }
            }
            best
        })
        .collect()
}

/// Mean direction of each cell's members. Empty cells, or cells whose members
/// cancel out, keep their previous centroid.
fn update_centroids(units: &[Vec<f32>], assignment: &[usize], centroids: &mut [f32], dim: usize) {
    let nlist = centroids.len() / dim.max(1);
    let mut sums = vec![0f32; nlist * dim];
    for (u, &cell) in units.iter().zip(assignment) {
        for (acc, x) in sums[cell * dim..(cell + 1) * dim].iter_mut().zip(u) {
            *acc += x;
        }
    }
    for c in 0..nlist {
        let sum = &sums[c * dim..(c + 1) * dim];
        let norm = l2_norm(sum);
        if norm > 0.0 {
            for (dst, x) in centroids[c * dim..(c + 1) * dim].iter_mut().zip(sum) {
                *dst = (f64::from(*x) / norm) as f32;
            }
        }
    }
}
