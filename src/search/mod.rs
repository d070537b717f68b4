//! Search Module
//!
//! The retrieval and ranking pipeline: intent classification, brute-force
//! dense search, FTS5 sparse search, the two-layer query cache, RRF fusion
//! with intent/chunk-type/hierarchy boosts, the stability regulator,
//! adaptive MMR diversification, the exploration probe, and optional
//! cross-encoder reranking.

pub mod cache;
pub mod dense;
pub mod exploration;
pub mod fusion;
pub mod intent;
pub mod mmr;
pub mod reranker;
pub mod sparse;
pub mod stability;

pub use cache::QueryCache;
pub use dense::{dense_search, DenseHit};
pub use exploration::{insert_probe, is_eligible as exploration_eligible, should_increment_boost};
pub use fusion::{effective_retrieval_limit, fuse, LatencyEma};
pub use intent::{classify_intent, Intent};
pub use mmr::{diversify, select_lambda, DocEntropyTracker};
pub use reranker::{
    apply_rerank, normalize_batch, RerankBackend, RollingStats, StaticRerankBackend,
};
pub use sparse::{sanitize_fts5_query, wrap_sparse_results, SparseHit};
pub use stability::{apply_stability_bias, compute_stability};

#[cfg(feature = "rerank")]
pub use reranker::HttpRerankBackend;
