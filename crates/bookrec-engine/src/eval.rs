//! Offline comparison of the exact and approximate strategies.
//!
//! Two evaluations: a hit-rate run that queries a seeded sample of the corpus
//! with each book's own description (the book should come back), and a
//! relevance run over hand-labelled queries scored with precision, recall and
//! MRR. Matching is on titles.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use bookrec_core::types::{RankedHit, Strategy};
use bookrec_core::Result;

use crate::engine::RetrievalEngine;

/// Fraction of predicted titles that are relevant; 0 for no predictions.
pub fn precision(predicted: &[&str], relevant: &[&str]) -> f64 {
    if predicted.is_empty() {
        return 0.0;
    }
    true_positives(predicted, relevant) as f64 / predicted.len() as f64
}

/// Fraction of relevant titles that were predicted; 0 when nothing is relevant.
pub fn recall(predicted: &[&str], relevant: &[&str]) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    true_positives(predicted, relevant) as f64 / relevant.len() as f64
}

/// Reciprocal rank of the first relevant prediction.
pub fn mrr(predicted: &[&str], relevant: &[&str]) -> f64 {
    predicted.iter().position(|t| relevant.contains(t)).map(|i| 1.0 / (i + 1) as f64).unwrap_or(0.0)
}

fn true_positives(predicted: &[&str], relevant: &[&str]) -> usize { predicted.iter().filter(|t| relevant.contains(t)).count() }

/// Unique titles over result count.
pub fn diversity(hits: &[RankedHit]) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = hits.iter().map(|h| h.title.as_str()).collect();
    unique.len() as f64 / hits.len() as f64
}

/// Share of distinct recommended titles that are not in `history`.
pub fn serendipity(hits: &[RankedHit], history: &[&str]) -> f64 {
    let titles: HashSet<&str> = hits.iter().map(|h| h.title.as_str()).collect();
    if titles.is_empty() {
        return 0.0;
    }
    titles.iter().filter(|t| !history.contains(t)).count() as f64 / titles.len() as f64
}

/// Share of the exact result ids the approximate result also returned.
/// Two empty results agree fully.
pub fn overlap(exact: &[RankedHit], approximate: &[RankedHit]) -> f64 {
    if exact.is_empty() {
        return 1.0;
    }
    let approx_ids: HashSet<&str> = approximate.iter().map(|h| h.id.as_str()).collect();
    exact.iter().filter(|h| approx_ids.contains(h.id.as_str())).count() as f64 / exact.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 }
}

fn titles(hits: &[RankedHit]) -> Vec<&str> { hits.iter().map(|h| h.title.as_str()).collect() }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRateReport {
    pub strategy: Strategy,
    pub hit_rate: f64,
    pub diversity: f64,
    pub serendipity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRateEvaluation {
    pub queries: usize,
    pub k: i64,
    pub exact: HitRateReport,
    pub approximate: HitRateReport,
    /// Mean share of exact ids also returned by the approximate strategy.
    pub overlap: f64,
}

/// Query a seeded `sample_fraction` of the corpus with each book's own
/// description through both strategies. Books without a description are
/// skipped.
pub fn evaluate_hit_rate(engine: &RetrievalEngine, sample_fraction: f64, k: i64, seed: u64) -> Result<HitRateEvaluation> {
    let records = engine.store().corpus().records();
    let mut candidates: Vec<usize> = (0..records.len()).filter(|&i| !records[i].description.trim().is_empty()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    candidates.shuffle(&mut rng);
    let take = ((candidates.len() as f64) * sample_fraction.clamp(0.0, 1.0)).ceil() as usize;
    candidates.truncate(take);
    tracing::info!(queries = candidates.len(), k, "evaluating hit rate");

    let mut overlaps = Vec::with_capacity(candidates.len());
    let (mut exact_runs, mut approx_runs) = (Runs::default(), Runs::default());
    for &i in &candidates {
        let record = &records[i];
        let exact = engine.recommend(&record.description, Strategy::Exact, k)?;
        let approximate = engine.recommend(&record.description, Strategy::Approximate, k)?;
        overlaps.push(overlap(&exact, &approximate));
        exact_runs.record(&exact, &record.title);
        approx_runs.record(&approximate, &record.title);
    }
    Ok(HitRateEvaluation {
        queries: candidates.len(),
        k,
        exact: exact_runs.report(Strategy::Exact),
        approximate: approx_runs.report(Strategy::Approximate),
        overlap: mean(&overlaps),
    })
}

#[derive(Default)]
struct Runs { hits: Vec<f64>, diversity: Vec<f64>, serendipity: Vec<f64> }

impl Runs {
    fn record(&mut self, hits: &[RankedHit], own_title: &str) {
        self.hits.push(if hits.iter().any(|h| h.title == own_title) { 1.0 } else { 0.0 });
        self.diversity.push(diversity(hits));
        self.serendipity.push(serendipity(hits, &[own_title]));
    }

    fn report(&self, strategy: Strategy) -> HitRateReport {
        HitRateReport { strategy, hit_rate: mean(&self.hits), diversity: mean(&self.diversity), serendipity: mean(&self.serendipity) }
    }
}

/// A labelled query: the titles a good answer should contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceCase {
    pub query: String,
    pub relevant_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceReport {
    pub strategy: Strategy,
    pub precision: f64,
    pub recall: f64,
    pub mrr: f64,
}

/// Mean precision, recall and MRR per strategy over `cases`.
pub fn evaluate_relevance(engine: &RetrievalEngine, cases: &[RelevanceCase], k: i64) -> Result<Vec<RelevanceReport>> {
    let mut reports = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        let (mut p, mut r, mut m) = (Vec::new(), Vec::new(), Vec::new());
        for case in cases {
            let hits = engine.recommend(&case.query, strategy, k)?;
            let predicted = titles(&hits);
            let relevant: Vec<&str> = case.relevant_titles.iter().map(String::as_str).collect();
            p.push(precision(&predicted, &relevant));
            r.push(recall(&predicted, &relevant));
            m.push(mrr(&predicted, &relevant));
        }
        reports.push(RelevanceReport { strategy, precision: mean(&p), recall: mean(&r), mrr: mean(&m) });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, title: &str) -> RankedHit {
        RankedHit { id: id.into(), title: title.into(), authors: vec![], description: String::new(), score: 0.5 }
    }

    #[test]
    fn precision_recall_and_mrr() {
        let predicted = ["a", "x", "b"];
        let relevant = ["a", "b", "c", "d"];
        assert!((precision(&predicted, &relevant) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(recall(&predicted, &relevant), 0.5);
        assert_eq!(mrr(&predicted, &relevant), 1.0);
        assert_eq!(mrr(&["x", "y", "b"], &relevant), 1.0 / 3.0);
        assert_eq!(mrr(&["x"], &relevant), 0.0);
        assert_eq!(precision(&[], &relevant), 0.0);
        assert_eq!(recall(&predicted, &[]), 0.0);
    }

    #[test]
    fn diversity_and_serendipity_use_titles() {
        let hits = vec![hit("1", "Dune"), hit("2", "Dune"), hit("3", "Emma"), hit("4", "Ulysses")];
        assert_eq!(diversity(&hits), 0.75);
        // distinct titles: Dune, Emma, Ulysses
        assert!((serendipity(&hits, &["Dune"]) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(diversity(&[]), 0.0);
        assert_eq!(serendipity(&[], &["Dune"]), 0.0);
    }

    #[test]
    fn overlap_counts_shared_ids() {
        let exact = vec![hit("1", "a"), hit("2", "b"), hit("3", "c"), hit("4", "d")];
        let approx = vec![hit("2", "b"), hit("1", "a"), hit("9", "z")];
        assert_eq!(overlap(&exact, &approx), 0.5);
        assert_eq!(overlap(&[], &approx), 1.0);
    }
}
