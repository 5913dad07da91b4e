use thiserror::Error;

/// Failures of the retrieval core.
///
/// The type is `Clone` so one failed computation can be handed to every
/// caller waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid k: {0} (must be >= 0)")]
    InvalidK(i64),

    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Computation aborted: {0}")]
    ComputationAborted(String),
}

impl RetrievalError {
    /// Wrap a collaborator failure, keeping its context chain.
    pub fn embedding(err: impl std::fmt::Display) -> Self { Self::Embedding(format!("{:#}", err)) }

    pub fn corpus(err: impl std::fmt::Display) -> Self { Self::Corpus(format!("{:#}", err)) }

    /// Whether the caller supplied bad input (maps to a 4xx at a service boundary).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidK(_) | Self::UnsupportedStrategy(_))
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
