pub mod builder;
pub mod corpus;
pub mod ivf;
pub mod schema;
pub mod similarity;
pub mod snapshot;
pub mod store;

pub use builder::IndexBuilder;
pub use corpus::Corpus;
pub use ivf::{ApproxIndex, IvfParams};
pub use snapshot::{load_or_build, open_db, SnapshotMeta};
pub use store::VectorStore;
