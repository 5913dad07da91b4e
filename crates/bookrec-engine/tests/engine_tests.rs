use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use bookrec_core::config::Settings;
use bookrec_core::traits::Embedder;
use bookrec_core::types::{BookRecord, CorpusItem, Strategy};
use bookrec_core::RetrievalError;
use bookrec_embed::HashingEmbedder;
use bookrec_engine::eval::{evaluate_hit_rate, evaluate_relevance, RelevanceCase};
use bookrec_engine::RetrievalEngine;
use bookrec_vector::IndexBuilder;

const BOOKS: &[(&str, &str, &str)] = &[
    ("b1", "The Wizard's School", "a young wizard discovers his magical heritage at a hidden school"),
    ("b2", "Fog Over London", "a detective solves a string of murders in victorian london"),
    ("b3", "Arms of the World", "a global history of the second world war and its battles"),
    ("b4", "Modern Web Recipes", "practical recipes for modern web development with javascript"),
    ("b5", "The White Whale", "a sea captain hunts a white whale across the ocean"),
    ("b6", "Starship Dawn", "a starship crew explores distant galaxies and alien worlds"),
    ("b7", "Garden Seasons", "growing vegetables and flowers through the seasons in a small garden"),
    ("b8", "Kitchen Basics", "simple recipes for home cooking and baking bread"),
];

fn items() -> Vec<CorpusItem> {
    BOOKS
        .iter()
        .map(|(id, title, text)| {
            CorpusItem::new(BookRecord { id: id.to_string(), title: title.to_string(), authors: vec![], description: text.to_string(), processed_text: text.to_string() })
        })
        .collect()
}

/// Hashing embedder that counts calls and can be slowed down or broken.
struct Counting { inner: HashingEmbedder, calls: AtomicUsize, delay: Duration, fail_queries: bool, nan_queries: bool }

impl Counting {
    fn new() -> Self { Self { inner: HashingEmbedder::new(64), calls: AtomicUsize::new(0), delay: Duration::ZERO, fail_queries: false, nan_queries: false } }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Embedder for Counting {
    fn embedder_id(&self) -> &str { "counting" }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { self.inner.embed_many(texts) }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail_queries {
            anyhow::bail!("embedding service unavailable");
        }
        let mut v = self.inner.embed(text)?;
        if self.nan_queries {
            v[0] = f32::NAN;
        }
        Ok(v)
    }
}

fn engine_with(counter: Counting, capacity: usize) -> (RetrievalEngine, Arc<Counting>) {
    let counter = Arc::new(counter);
    let (store, index) = IndexBuilder::new(&*counter).build(&items()).expect("build");
    let engine = RetrievalEngine::new(store, index, counter.clone(), capacity).expect("engine");
    (engine, counter)
}

#[test]
fn k_zero_returns_empty_without_embedding() {
    let (engine, counter) = engine_with(Counting::new(), 10);
    for strategy in Strategy::ALL {
        assert!(engine.recommend("anything", strategy, 0).expect("k=0").is_empty());
        assert!(engine.recommend("", strategy, 0).expect("k=0 ignores description").is_empty());
    }
    assert_eq!(counter.calls(), 0);
    assert_eq!(engine.cache_stats().len, 0);
}

#[test]
fn invalid_arguments_are_client_errors() {
    let (engine, counter) = engine_with(Counting::new(), 10);
    let negative = engine.recommend("a whale", Strategy::Exact, -1).unwrap_err();
    assert!(matches!(negative, RetrievalError::InvalidArgument(_)));
    assert!(negative.is_client_error());
    let blank = engine.recommend("   ", Strategy::Approximate, 3).unwrap_err();
    assert!(matches!(blank, RetrievalError::InvalidArgument(_)));
    assert_eq!(counter.calls(), 0);
}

#[test]
fn unknown_strategy_name_is_rejected() {
    let (engine, _) = engine_with(Counting::new(), 10);
    let err = engine.recommend_named("a whale", "annoy", 3).unwrap_err();
    assert_eq!(err, RetrievalError::UnsupportedStrategy("annoy".to_string()));
    assert!(engine.recommend_named("a whale", "cosine", 3).is_ok());
    assert!(engine.recommend_named("a whale", "approximate", 3).is_ok());
}

#[test]
fn own_description_ranks_the_book_first() {
    let (engine, _) = engine_with(Counting::new(), 10);
    for (id, _, text) in BOOKS {
        let hits = engine.recommend(text, Strategy::Exact, 3).expect("exact");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, *id);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }
    assert_eq!(engine.recommend("whale", Strategy::Exact, 100).expect("exact").len(), BOOKS.len());
}

#[test]
fn repeated_query_is_served_from_cache() {
    let (engine, counter) = engine_with(Counting::new(), 10);
    let first = engine.recommend("a sea captain and a whale", Strategy::Exact, 3).expect("first");
    let second = engine.recommend("a sea captain and a whale", Strategy::Exact, 3).expect("second");
    assert_eq!(first, second);
    assert_eq!(counter.calls(), 1);

    // strategy and k are part of the key
    engine.recommend("a sea captain and a whale", Strategy::Approximate, 3).expect("approx");
    engine.recommend("a sea captain and a whale", Strategy::Exact, 2).expect("k=2");
    assert_eq!(counter.calls(), 3);
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.len), (1, 3, 3));
}

#[test]
fn concurrent_identical_queries_embed_once() {
    let counter = Counting { delay: Duration::from_millis(100), ..Counting::new() };
    let (engine, counter) = engine_with(counter, 10);
    let engine = Arc::new(engine);
    let barrier = Arc::new(Barrier::new(12));
    let handles: Vec<_> = (0..12)
        .map(|_| {
            let (engine, barrier) = (Arc::clone(&engine), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                engine.recommend("galaxies and alien worlds", Strategy::Approximate, 4)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("thread").expect("recommend")).collect();
    assert_eq!(counter.calls(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0][0].id, "b6");
}

#[test]
fn cache_evicts_least_recently_used_query() {
    let (engine, counter) = engine_with(Counting::new(), 2);
    engine.recommend("whale", Strategy::Exact, 2).expect("q1");
    engine.recommend("garden", Strategy::Exact, 2).expect("q2");
    engine.recommend("whale", Strategy::Exact, 2).expect("q1 again");
    engine.recommend("bread", Strategy::Exact, 2).expect("q3 evicts garden");
    assert_eq!(counter.calls(), 3);

    engine.recommend("whale", Strategy::Exact, 2).expect("still cached");
    assert_eq!(counter.calls(), 3);
    engine.recommend("garden", Strategy::Exact, 2).expect("recomputed");
    assert_eq!(counter.calls(), 4);
}

#[test]
fn embedding_failure_propagates_and_is_not_cached() {
    let (engine, counter) = engine_with(Counting { fail_queries: true, ..Counting::new() }, 10);
    for _ in 0..2 {
        let err = engine.recommend("whale", Strategy::Approximate, 3).unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(ref msg) if msg.contains("unavailable")));
        assert!(!err.is_client_error());
    }
    assert_eq!(counter.calls(), 2);
    assert_eq!(engine.cache_stats().len, 0);
}

#[test]
fn non_finite_query_embedding_is_an_embedding_error() {
    let (engine, counter) = engine_with(Counting { nan_queries: true, ..Counting::new() }, 10);
    for strategy in Strategy::ALL {
        let err = engine.recommend("whale", strategy, 3).unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(ref msg) if msg.contains("non-finite")));
    }
    assert_eq!(counter.calls(), 2);
    assert_eq!(engine.cache_stats().len, 0);
}

#[test]
fn engine_rejects_embedder_of_another_dimension() {
    let counter = Counting::new();
    let (store, index) = IndexBuilder::new(&counter).build(&items()).expect("build");
    let err = RetrievalEngine::new(store, index, Arc::new(HashingEmbedder::new(32)), 10).err().expect("mismatch");
    assert_eq!(err, RetrievalError::DimensionMismatch { expected: 64, actual: 32 });
}

#[test]
fn build_from_settings() {
    let settings = Settings::default();
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(settings.embedding.dim));
    let engine = RetrievalEngine::build(&items(), embedder, &settings).expect("engine");
    assert_eq!(engine.store().len(), BOOKS.len());
    assert_eq!(engine.index().len(), BOOKS.len());
    assert_eq!(engine.cache_stats().capacity, 100);
    assert_eq!(engine.embedder_id(), "hash:d384");
}

#[test]
fn evaluation_reports_both_strategies() {
    let (engine, _) = engine_with(Counting::new(), 100);
    let report = evaluate_hit_rate(&engine, 1.0, 3, 42).expect("hit rate");
    assert_eq!(report.queries, BOOKS.len());
    assert_eq!(report.exact.hit_rate, 1.0);
    assert!(report.overlap > 0.0 && report.overlap <= 1.0);
    assert!(report.exact.diversity > 0.0);

    let cases = vec![RelevanceCase { query: "a white whale at sea".into(), relevant_titles: vec!["The White Whale".into()] }];
    let reports = evaluate_relevance(&engine, &cases, 3).expect("relevance");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].strategy, Strategy::Exact);
    assert_eq!(reports[0].mrr, 1.0);
}
