//! Query-side of the recommender: the memoizing cache, the engine that
//! dispatches between exact and approximate ranking, and offline evaluation.

pub mod cache;
pub mod engine;
pub mod eval;

pub use cache::{CacheStats, QueryCache};
pub use engine::RetrievalEngine;
