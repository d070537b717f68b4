//! Crate-wide error taxonomy (§7).
//!
//! Only storage-fatal and dimension-mismatch conditions propagate to the
//! caller as `Err`. Storage-recoverable, backend-failure, and anomaly
//! conditions are logged via `tracing` and degrade to a documented fallback
//! value — see the call sites in [`crate::storage`] and
//! [`crate::search::reranker`].

/// Top-level error type for the retrieval core.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Storage-fatal: open failed, or the schema is unreadable. Refuse
    /// further operations on this handle.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Storage-fatal: the backing file or directory could not be accessed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A query or insert vector's dimension did not match the workspace's
    /// registered `embedding_dimension`. Callers should present this as a
    /// misconfiguration, not a bug.
    #[error("embedding dimension mismatch: workspace expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Attempted an operation against a workspace that has no registered
    /// `embedding_dimension` yet.
    #[error("workspace has no registered embedding dimension")]
    DimensionUnset,

    /// Storage-fatal: the requested chunk does not exist.
    #[error("chunk not found: {0}")]
    ChunkNotFound(i64),

    /// The cross-encoder rerank backend failed or returned malformed data.
    /// Never propagated past the engine boundary — the pre-rerank result
    /// list is returned instead and this variant exists only for the
    /// backend trait's own `Result`.
    #[error("rerank backend error: {0}")]
    RerankBackend(String),

    /// A mutex guarding shared in-process state was poisoned by a panicking
    /// holder. Treated as storage-fatal at the store boundary; degraded at
    /// rerank-adjacent call sites the same way a backend failure is.
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
