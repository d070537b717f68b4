//! Retrieval engine facade (§2 component 13, §9 Design Notes).
//!
//! Owns everything scoped to one workspace: the store, the query cache, the
//! latency EMA, and — when reranking is enabled — the rerank backend and
//! its rolling calibration statistics. None of these are process-wide
//! singletons; a process may host several engines, one per workspace.
//!
//! Exposes a synchronous query API. Dense and sparse search run
//! concurrently on scoped threads; only the optional cross-encoder rerank
//! call blocks on external I/O, via a small dedicated async runtime.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::chunk::{RetrievalLogEntry, RetrievalResult};
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::search::{
    apply_rerank, apply_stability_bias, classify_intent, compute_stability, dense_search,
    diversify, effective_retrieval_limit, exploration_eligible, fuse, insert_probe,
    normalize_batch, select_lambda, should_increment_boost, wrap_sparse_results, DocEntropyTracker,
    LatencyEma, QueryCache, RerankBackend, RollingStats,
};
use crate::storage::Store;

/// One labeled intermediate stage of a query's progressive delivery (§9
/// Design Notes: "staged delivery" — callers may consume only the final
/// stage, or observe each one as it becomes available).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    /// Sparse-only result available immediately after fusion inputs
    /// arrive, before any ranking refinement.
    KeywordOnly,
    /// RRF-fused, stability-biased, MMR-diversified, exploration-injected.
    Hybrid,
    /// Final list after cross-encoder reranking (identical to `Hybrid` if
    /// reranking is disabled or the backend failed).
    Reranked,
}

/// Facade over one workspace's full retrieval pipeline.
pub struct RetrievalEngine {
    store: Store,
    config: RetrievalConfig,
    cache: QueryCache,
    latency: LatencyEma,
    entropy: Mutex<DocEntropyTracker>,
    rerank_backend: Option<Arc<dyn RerankBackend>>,
    rerank_stats: Mutex<RollingStats>,
    rerank_runtime: Option<tokio::runtime::Runtime>,
}

impl RetrievalEngine {
    pub fn new(store: Store, config: RetrievalConfig) -> Self {
        let cache = QueryCache::new(config.cache);
        let latency = LatencyEma::new(config.latency);
        Self {
            store,
            config,
            cache,
            latency,
            entropy: Mutex::new(DocEntropyTracker::new()),
            rerank_backend: None,
            rerank_stats: Mutex::new(RollingStats::fresh()),
            rerank_runtime: None,
        }
    }

    /// Attach a cross-encoder rerank backend. Restores persisted
    /// `<model>_mean` / `<model>_std` calibration if present (§6), which
    /// also activates drift detection immediately rather than waiting for
    /// a fresh first-batch seed.
    pub fn with_rerank_backend(mut self, backend: Arc<dyn RerankBackend>) -> Result<Self> {
        let mean_key = format!("{}_mean", backend.model_key());
        let std_key = format!("{}_std", backend.model_key());

        let persisted_mean = self.store.get_metadata(&mean_key)?.and_then(|v| v.parse::<f32>().ok());
        let persisted_std = self.store.get_metadata(&std_key)?.and_then(|v| v.parse::<f32>().ok());

        if let (Some(mean), Some(std)) = (persisted_mean, persisted_std) {
            let mut stats = self
                .rerank_stats
                .lock()
                .map_err(|_| crate::error::RetrievalError::LockPoisoned("rerank stats".into()))?;
            *stats = RollingStats::from_persisted(mean, std);
        }

        self.rerank_backend = Some(backend);
        // `enable_all` is required, not just `enable_time`: an HTTP backend's
        // connections need the IO driver too, or `block_on` panics the first
        // time it actually reaches the network.
        self.rerank_runtime = Some(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build rerank runtime"),
        );
        Ok(self)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Force the latency EMA to a specific value, bypassing its normal
    /// exponential update. Exists for exercising the degradation ladder
    /// (shrink/bypass thresholds) without actually producing slow queries.
    pub fn seed_latency(&self, ms: f32) {
        self.latency.seed(ms);
    }

    /// Run a query through the full pipeline, invoking `on_stage` with each
    /// labeled intermediate result as it becomes available. Callers that
    /// only want the final answer can pass a no-op callback — see
    /// [`Self::query`].
    pub fn query_staged(
        &self,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
        mut on_stage: impl FnMut(QueryStage, &[RetrievalResult]),
    ) -> Result<Vec<RetrievalResult>> {
        let query_start = Instant::now();

        if let Some(cached) = self.cache.get_exact(query)? {
            return Ok(cached);
        }
        if let Some(cached) = self.cache.get_semantic(query_embedding)? {
            return Ok(cached);
        }

        self.store.check_dimension(query_embedding.len())?;

        let intent = classify_intent(query);
        let retrieval_limit = effective_retrieval_limit(limit, intent, &self.latency);
        let bypass_dense = self.latency.should_bypass_dense(intent);

        let embed_start = Instant::now();
        // Embedding generation itself is out of scope — `query_embedding`
        // is handed in already computed; this only measures guardrail work.
        let latency_embedding_ms = embed_start.elapsed().as_secs_f64() * 1000.0;

        let search_start = Instant::now();
        let (dense_hits, sparse_chunks) = std::thread::scope(|scope| {
            let dense_handle = scope.spawn(|| {
                if bypass_dense {
                    return Vec::new();
                }
                match self.store.all_chunks() {
                    Ok(chunks) => dense_search(&chunks, query_embedding, retrieval_limit),
                    Err(e) => {
                        tracing::warn!(error = %e, "dense search scan failed, degrading to empty");
                        Vec::new()
                    }
                }
            });
            let sparse_handle = scope.spawn(|| match self.store.keyword_search(query, retrieval_limit) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(error = %e, "sparse search failed, degrading to empty");
                    Vec::new()
                }
            });
            (
                dense_handle.join().expect("dense search thread panicked"),
                sparse_handle.join().expect("sparse search thread panicked"),
            )
        });
        let sparse_hits = wrap_sparse_results(sparse_chunks, retrieval_limit);
        let latency_search_ms = search_start.elapsed().as_secs_f64() * 1000.0;

        if dense_hits.is_empty() && sparse_hits.is_empty() {
            return Ok(Vec::new());
        }

        let fusion_start = Instant::now();
        let mut fused = fuse(&dense_hits, &sparse_hits, intent);
        on_stage(QueryStage::KeywordOnly, &fused);

        let recent_deltas = self.store.recent_rank_deltas(query, self.config.stability.history_window)?;
        let stability = compute_stability(&recent_deltas, &self.config.stability);
        apply_stability_bias(&mut fused, stability, intent);

        let mut mmr_penalty_total = 0.0;
        if self.config.mmr.enabled && fused.len() > 1 {
            let lambda = select_lambda(query, intent, &self.config.mmr);
            let doc_entropy = {
                let mut tracker = self
                    .entropy
                    .lock()
                    .map_err(|_| crate::error::RetrievalError::LockPoisoned("doc entropy tracker".into()))?;
                tracker.update(&fused, &self.config.mmr);
                tracker.current()
            };
            let (diversified, penalty) = diversify(&fused, limit, lambda, doc_entropy, &self.config.mmr);
            fused = diversified;
            mmr_penalty_total = penalty;
        } else {
            fused.truncate(limit);
        }

        if exploration_eligible(&self.config.exploration, stability, intent, &fused) {
            fused = insert_probe(fused, &dense_hits, limit, &self.config.exploration);
        }
        let latency_fusion_ms = fusion_start.elapsed().as_secs_f64() * 1000.0;
        on_stage(QueryStage::Hybrid, &fused);

        let rerank_start = Instant::now();
        if self.config.rerank.enabled {
            fused = self.try_rerank(query, fused);
        }
        let latency_rerank_ms = rerank_start.elapsed().as_secs_f64() * 1000.0;
        on_stage(QueryStage::Reranked, &fused);

        self.cache.insert(query, query_embedding.to_vec(), fused.clone())?;

        let top = fused.first();
        let final_rank = 1;
        // How far the final top chunk moved relative to its own dense-baseline
        // rank (§4.11). A chunk that was already the dense #1 contributes 0;
        // one pulled up from dense rank 5 contributes 4. A chunk absent from
        // the dense list entirely (sparse-only surfaced) contributes 0 — there
        // is no dense baseline rank to diff against.
        let rank_delta = top
            .and_then(|r| r.semantic_rank)
            .map(|dense_rank| (final_rank - dense_rank as i32).abs())
            .unwrap_or(0);

        let log_entry = RetrievalLogEntry {
            id: Uuid::new_v4().to_string(),
            query: query.to_string(),
            semantic_rank: top.and_then(|r| r.semantic_rank).map(|r| r as i32),
            keyword_rank: top.and_then(|r| r.keyword_rank).map(|r| r as i32),
            final_rank,
            latency_embedding_ms,
            latency_search_ms,
            latency_fusion_ms,
            latency_rerank_ms,
            top_score: top.map(|r| r.score).unwrap_or(0.0),
            mmr_penalty_total,
            is_exploration: top.map(|r| r.is_exploration).unwrap_or(false),
            rank_delta,
            stability,
            created_at: Utc::now(),
        };
        self.store.append_retrieval_log(&log_entry)?;

        self.latency.record((query_start.elapsed().as_secs_f64() * 1000.0) as f32);

        Ok(fused)
    }

    /// Run a query and return only the final result list.
    pub fn query(&self, query: &str, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievalResult>> {
        self.query_staged(query, query_embedding, limit, |_, _| {})
    }

    fn try_rerank(&self, query: &str, fused: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        let (Some(backend), Some(runtime)) = (&self.rerank_backend, &self.rerank_runtime) else {
            return fused;
        };

        let candidate_count = self.config.rerank.candidate_count.min(fused.len());
        let texts: Vec<String> = fused[..candidate_count]
            .iter()
            .map(|r| {
                let mut t = r.text.clone();
                t.truncate(self.config.rerank.text_truncate_chars);
                t
            })
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let raw_scores = runtime.block_on(backend.score_batch(query, &refs));
        let raw_scores = match raw_scores {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "rerank backend failed, returning pre-rerank list");
                return fused;
            }
        };

        let mut stats = match self.rerank_stats.lock() {
            Ok(stats) => stats,
            Err(_) => {
                tracing::warn!("rerank stats lock poisoned, returning pre-rerank list");
                return fused;
            }
        };
        let normalized = normalize_batch(&raw_scores, &mut stats, &self.config.rerank);

        if normalized.drifted {
            tracing::warn!(model = backend.model_key(), "rerank rolling statistics reset after drift");
        }
        if normalized.frozen {
            tracing::warn!(model = backend.model_key(), "rerank batch detected as frozen (near-zero variance)");
        }

        let mean_key = format!("{}_mean", backend.model_key());
        let std_key = format!("{}_std", backend.model_key());
        if let Err(e) = self.store.set_metadata(&mean_key, &stats.mean.to_string()) {
            tracing::warn!(error = %e, "failed to persist rerank mean");
        }
        if let Err(e) = self.store.set_metadata(&std_key, &stats.std.to_string()) {
            tracing::warn!(error = %e, "failed to persist rerank std");
        }
        drop(stats);

        apply_rerank(fused, &normalized, candidate_count)
    }

    /// Feedback entry point (§6): appends a log row and, iff
    /// `is_exploration` is false, increments `boost_factor` by +0.1.
    pub fn record_interaction(&self, chunk_id: i64, query: &str, is_exploration: bool) -> Result<()> {
        let entry = RetrievalLogEntry {
            id: Uuid::new_v4().to_string(),
            query: query.to_string(),
            semantic_rank: None,
            keyword_rank: None,
            final_rank: 1,
            latency_embedding_ms: 0.0,
            latency_search_ms: 0.0,
            latency_fusion_ms: 0.0,
            latency_rerank_ms: 0.0,
            top_score: 0.0,
            mmr_penalty_total: 0.0,
            is_exploration,
            rank_delta: 0,
            stability: 1.0,
            created_at: Utc::now(),
        };
        self.store.append_retrieval_log(&entry)?;

        if should_increment_boost(is_exploration) {
            self.store.boost_chunk(chunk_id, 0.1)?;
        }
        Ok(())
    }
}
