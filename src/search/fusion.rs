//! Reciprocal-rank fusion with intent-aware weights, chunk-type and
//! hierarchy boosts, and the latency-driven degradation ladder (§4.6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::chunk::{Chunk, ChunkType, RetrievalResult};
use crate::config::{intent_weights, LatencyConfig, RRF_K};
use crate::search::dense::DenseHit;
use crate::search::intent::Intent;
use crate::search::sparse::SparseHit;

/// Per-engine exponentially-weighted moving average of total search
/// latency, seeded at `ema_seed_ms` (§4.6, §5, §9). Stored as bit-packed
/// `f32` in an `AtomicU32` so reads from concurrent queries never block;
/// a torn update is benign since the EMA only gates coarse behavior.
pub struct LatencyEma {
    bits: AtomicU32,
    config: LatencyConfig,
}

impl LatencyEma {
    pub fn new(config: LatencyConfig) -> Self {
        Self {
            bits: AtomicU32::new(config.ema_seed_ms.to_bits()),
            config,
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn record(&self, sample_ms: f32) {
        let alpha = self.config.ema_alpha;
        let current = self.get();
        let updated = (1.0 - alpha) * current + alpha * sample_ms;
        self.bits.store(updated.to_bits(), Ordering::Relaxed);
    }

    /// Seed the EMA directly — used by tests to force the degradation ladder.
    pub fn seed(&self, value_ms: f32) {
        self.bits.store(value_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn should_shrink(&self) -> bool {
        self.get() > self.config.shrink_threshold_ms
    }

    /// Dense search should be bypassed entirely (sparse-only) when the EMA
    /// has crossed the critical threshold and the intent isn't Summary.
    pub fn should_bypass_dense(&self, intent: Intent) -> bool {
        self.get() > self.config.bypass_threshold_ms && intent != Intent::Summary
    }
}

/// Resolve the effective retrieval-fanout limit for a query, applying the
/// intent-aware base multiplier and then the latency-driven shrink (§4.6).
pub fn effective_retrieval_limit(limit: usize, intent: Intent, latency: &LatencyEma) -> usize {
    let weights = intent_weights(intent);
    let multiplier = if latency.should_shrink() {
        weights.retrieval_limit_multiplier.min(3)
    } else {
        weights.retrieval_limit_multiplier
    };
    limit * multiplier
}

fn chunk_type_boost(intent: Intent, chunk_type: &ChunkType, dense_side: bool) -> f32 {
    match (intent, chunk_type) {
        (Intent::Definition, ChunkType::Definition) => {
            if dense_side {
                0.5
            } else {
                0.3
            }
        }
        (Intent::Summary, ChunkType::Summary) => {
            if dense_side {
                0.5
            } else {
                0.3
            }
        }
        (Intent::Procedure, ChunkType::List) => 0.3,
        (Intent::Example, ChunkType::Example) => 0.4,
        _ => 0.0,
    }
}

fn hierarchy_boost(intent: Intent, heading_level: i32) -> f32 {
    match intent {
        Intent::Summary if heading_level == 1 => 0.2,
        Intent::Definition if heading_level > 1 => 0.1,
        _ => 0.0,
    }
}

struct Candidate {
    chunk: Chunk,
    semantic_rank: Option<usize>,
    keyword_rank: Option<usize>,
    trust_score: f32,
    score: f32,
}

/// Fuse dense and sparse result lists into ranked [`RetrievalResult`]s.
///
/// Missing rank on one side contributes zero RRF from that side. Ties are
/// broken by first-seen (insertion) order — dense candidates are inserted
/// before sparse ones, matching the declared input order.
pub fn fuse(dense: &[DenseHit], sparse: &[SparseHit], intent: Intent) -> Vec<RetrievalResult> {
    let weights = intent_weights(intent);
    let mut order: Vec<i64> = Vec::new();
    let mut by_id: HashMap<i64, Candidate> = HashMap::new();

    for (idx, hit) in dense.iter().enumerate() {
        let rank = idx + 1;
        order.push(hit.chunk.id);
        by_id.insert(
            hit.chunk.id,
            Candidate {
                chunk: hit.chunk.clone(),
                semantic_rank: Some(rank),
                keyword_rank: None,
                trust_score: hit.trust_score,
                score: 0.0,
            },
        );
    }

    for (idx, hit) in sparse.iter().enumerate() {
        let rank = idx + 1;
        by_id
            .entry(hit.chunk.id)
            .and_modify(|c| c.keyword_rank = Some(rank))
            .or_insert_with(|| {
                order.push(hit.chunk.id);
                Candidate {
                    chunk: hit.chunk.clone(),
                    semantic_rank: None,
                    keyword_rank: Some(rank),
                    trust_score: 0.0,
                    score: 0.0,
                }
            });
    }

    for id in &order {
        let candidate = by_id.get_mut(id).expect("id present in map");
        let mut score = 0.0;
        if let Some(r_s) = candidate.semantic_rank {
            score += weights.semantic_weight * (1.0 / (RRF_K + r_s as f32));
            score += chunk_type_boost(intent, &candidate.chunk.chunk_type, true);
        }
        if let Some(r_k) = candidate.keyword_rank {
            score += weights.keyword_weight * (1.0 / (RRF_K + r_k as f32));
            score += chunk_type_boost(intent, &candidate.chunk.chunk_type, false);
        }
        score += hierarchy_boost(intent, candidate.chunk.heading_level);
        candidate.score = score;
    }

    let mut results: Vec<RetrievalResult> = order
        .into_iter()
        .map(|id| {
            let c = by_id.remove(&id).expect("id present in map");
            RetrievalResult {
                chunk_id: c.chunk.id,
                text: c.chunk.text,
                source_file: c.chunk.source_file,
                doc_id: c.chunk.doc_id,
                page: c.chunk.page,
                heading_path: c.chunk.heading_path,
                heading_level: c.chunk.heading_level,
                chunk_type: c.chunk.chunk_type,
                score: c.score,
                semantic_rank: c.semantic_rank,
                keyword_rank: c.keyword_rank,
                rerank_rank: None,
                trust_score: c.trust_score,
                is_exploration: false,
                stability: 1.0,
            }
        })
        .collect();

    // Stable sort: ties keep insertion order since Rust's sort is stable.
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;
    use chrono::Utc;

    fn chunk(id: i64, chunk_type: ChunkType, heading_level: i32) -> Chunk {
        Chunk {
            id,
            source_file: "doc.pdf".into(),
            doc_id: "doc-1".into(),
            page: 1,
            chunk_index: 0,
            text: format!("chunk {id}"),
            embedding: vec![],
            embedding_model: "test".into(),
            embedding_dimension: 0,
            heading_path: String::new(),
            heading_level,
            chunk_type,
            list_type: None,
            list_length: None,
            sentence_count: 1,
            created_at: Utc::now(),
            boost_factor: 1.0,
        }
    }

    #[test]
    fn rrf_monotone_in_dense_rank() {
        let sparse = vec![SparseHit { chunk: chunk(1, ChunkType::Text, 0), score: 0.5 }];
        let dense_rank_1 = vec![DenseHit { chunk: chunk(1, ChunkType::Text, 0), score: 0.9, trust_score: 1.0 }];
        let dense_rank_3 = vec![
            DenseHit { chunk: chunk(2, ChunkType::Text, 0), score: 0.95, trust_score: 1.0 },
            DenseHit { chunk: chunk(3, ChunkType::Text, 0), score: 0.93, trust_score: 1.0 },
            DenseHit { chunk: chunk(1, ChunkType::Text, 0), score: 0.9, trust_score: 1.0 },
        ];
        let better = fuse(&dense_rank_1, &sparse, Intent::General);
        let worse = fuse(&dense_rank_3, &sparse, Intent::General);
        let better_score = better.iter().find(|r| r.chunk_id == 1).unwrap().score;
        let worse_score = worse.iter().find(|r| r.chunk_id == 1).unwrap().score;
        assert!(better_score >= worse_score);
    }

    #[test]
    fn definition_intent_boosts_definition_chunk_to_top() {
        // Scenario 1 from the spec: A=definition(level2), B=text, C=text.
        let a = chunk(1, ChunkType::Definition, 2);
        let b = chunk(2, ChunkType::Text, 0);
        let c = chunk(3, ChunkType::Text, 0);

        let dense = vec![
            DenseHit { chunk: b.clone(), score: 0.9, trust_score: 1.0 },
            DenseHit { chunk: a.clone(), score: 0.85, trust_score: 1.0 },
            DenseHit { chunk: c.clone(), score: 0.8, trust_score: 1.0 },
        ];
        let sparse = vec![
            SparseHit { chunk: a, score: 0.5 },
            SparseHit { chunk: c, score: 0.5 },
            SparseHit { chunk: b, score: 0.5 },
        ];

        let fused = fuse(&dense, &sparse, Intent::Definition);
        assert_eq!(fused[0].chunk_id, 1);
    }

    #[test]
    fn missing_side_contributes_zero() {
        let dense = vec![DenseHit { chunk: chunk(1, ChunkType::Text, 0), score: 0.9, trust_score: 1.0 }];
        let fused = fuse(&dense, &[], Intent::General);
        assert_eq!(fused.len(), 1);
        assert!(fused[0].keyword_rank.is_none());
    }

    #[test]
    fn summary_intent_limit_multiplier_is_six() {
        let ema = LatencyEma::new(LatencyConfig::default());
        assert_eq!(effective_retrieval_limit(5, Intent::Summary, &ema), 30);
    }

    #[test]
    fn latency_ema_shrinks_past_threshold() {
        let ema = LatencyEma::new(LatencyConfig::default());
        ema.seed(2000.0);
        assert!(ema.should_shrink());
        assert_eq!(effective_retrieval_limit(5, Intent::Summary, &ema), 15);
    }

    #[test]
    fn latency_ema_bypasses_dense_past_critical_threshold_unless_summary() {
        let ema = LatencyEma::new(LatencyConfig::default());
        ema.seed(5000.0);
        assert!(ema.should_bypass_dense(Intent::General));
        assert!(!ema.should_bypass_dense(Intent::Summary));
    }
}
