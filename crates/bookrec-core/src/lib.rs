#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, RetrievalError};
pub use traits::{CorpusSource, Embedder};
pub use types::{BookRecord, CacheKey, CorpusItem, RankedHit, Strategy};
