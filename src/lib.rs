//! # Retrieval Core
//!
//! Hybrid dense + sparse retrieval engine for chunked document collections.
//!
//! - **Dense search**: brute-force cosine similarity over stored embeddings.
//!   No approximate-nearest-neighbor index — every query scans every chunk.
//! - **Sparse search**: SQLite FTS5 full-text index over chunk text and
//!   heading context.
//! - **Hybrid fusion**: Reciprocal Rank Fusion with intent-aware weights and
//!   chunk-type/hierarchy boosts.
//! - **Two-layer query cache**: exact-match LRU plus a semantic
//!   nearest-neighbor cache keyed on embedding cosine similarity.
//! - **Stability regulator**: biases fusion weights toward whichever signal
//!   has been producing more consistent rankings for a given query.
//! - **Adaptive MMR diversification**: greedy maximal-marginal-relevance
//!   reordering with a lambda tuned to query complexity and intent.
//! - **Exploration probe**: deliberately injects an uncertain candidate to
//!   acquire feedback, quarantined from the boost signal.
//! - **Cross-encoder rerank**: optional async reranking pass behind a
//!   pluggable backend trait, with rolling z-score calibration.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retrieval_core::{RetrievalConfig, RetrievalEngine, Store};
//!
//! let store = Store::open("workspace.db")?;
//! store.set_embedding_dimension(768)?;
//!
//! let engine = RetrievalEngine::new(store, RetrievalConfig::default());
//! let results = engine.query("what is a cache?", &query_embedding, 10)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rerank`: enables [`search::HttpRerankBackend`], an HTTP-JSON
//!   cross-encoder backend built on `reqwest`. Without it, only
//!   [`search::StaticRerankBackend`] and caller-provided
//!   [`search::RerankBackend`] implementations are available.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod search;
pub mod storage;
pub mod vector;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use chunk::{Chunk, ChunkType, RetrievalLogEntry, RetrievalResult, SearchMode};
pub use config::{
    CacheConfig, ExplorationConfig, IntentWeights, LatencyConfig, MmrConfig, RerankConfig,
    RetrievalConfig, StabilityConfig,
};
pub use engine::{QueryStage, RetrievalEngine};
pub use error::{Result, RetrievalError};
pub use search::{
    classify_intent, Intent, QueryCache, RerankBackend, RollingStats, StaticRerankBackend,
};
pub use storage::{Store, EMBEDDING_DIMENSION_KEY};
pub use vector::{blob_to_vector, cosine_similarity, vector_to_blob};

#[cfg(feature = "rerank")]
pub use search::HttpRerankBackend;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Chunk, ChunkType, Intent, QueryStage, RetrievalConfig, RetrievalEngine, RetrievalError,
        RetrievalResult, Result, SearchMode, Store,
    };

    #[cfg(feature = "rerank")]
    pub use crate::HttpRerankBackend;
}
