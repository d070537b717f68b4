//! Adaptive Maximal Marginal Relevance diversification (§4.8).
//!
//! Applied only in experimental-MMR mode, and only when there's more than
//! one candidate to choose among. Lambda adapts to query complexity; the
//! redundancy penalty is smoothed by a session-level EMA of document
//! entropy so a session that's been seeing diverse documents doesn't get
//! over-penalized for another diverse pick.

use std::collections::HashMap;

use crate::chunk::RetrievalResult;
use crate::config::MmrConfig;
use crate::search::intent::Intent;

/// Session-scoped entropy tracker feeding the MMR penalty. One instance per
/// retrieval engine, not a process-wide singleton (§9).
pub struct DocEntropyTracker {
    ema: f32,
    session_count: u32,
}

impl DocEntropyTracker {
    pub fn new() -> Self {
        Self { ema: 0.0, session_count: 0 }
    }

    pub fn current(&self) -> f32 {
        self.ema
    }

    /// Fold in the Shannon entropy (bits) of the current fused list's
    /// `docId` distribution.
    pub fn update(&mut self, results: &[RetrievalResult], config: &MmrConfig) {
        let entropy = doc_entropy_bits(results);
        let alpha = if self.session_count < config.warm_session_count {
            config.entropy_ema_alpha_warm
        } else {
            config.entropy_ema_alpha_stable
        };
        self.ema = (1.0 - alpha) * self.ema + alpha * entropy;
        self.session_count += 1;
    }
}

impl Default for DocEntropyTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn doc_entropy_bits(results: &[RetrievalResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in results {
        *counts.entry(r.doc_id.as_str()).or_default() += 1;
    }
    let total = results.len() as f32;
    -counts
        .values()
        .map(|&c| {
            let p = c as f32 / total;
            p * p.log2()
        })
        .sum::<f32>()
}

/// Sigmoid-tuned lambda from query complexity: word count and an intent
/// bonus for intents that favor broader coverage.
pub fn select_lambda(query: &str, intent: Intent, config: &MmrConfig) -> f32 {
    let word_count = query.split_whitespace().count() as f32;
    let complexity = word_count / 10.0
        + if matches!(intent, Intent::Summary | Intent::Procedure) {
            0.5
        } else {
            0.0
        };
    let sigmoid = 1.0 / (1.0 + (-5.0 * (complexity - 0.5)).exp());
    sigmoid.clamp(config.lambda_min, config.lambda_max)
}

/// Greedy MMR selection. Seeds with the top-1 result, then repeatedly picks
/// the remaining candidate maximizing `λ·score − (1−λ)·penalty` until
/// `limit` items are chosen or candidates are exhausted. Returns the
/// reordered list and the summed penalty (for logging as `mmrPenaltyTotal`).
pub fn diversify(
    fused: &[RetrievalResult],
    limit: usize,
    lambda: f32,
    doc_entropy: f32,
    config: &MmrConfig,
) -> (Vec<RetrievalResult>, f32) {
    if fused.len() <= 1 {
        return (fused.to_vec(), 0.0);
    }

    let mut remaining: Vec<RetrievalResult> = fused.to_vec();
    let first = remaining.remove(0);
    let mut selected_doc_ids = vec![first.doc_id.clone()];
    let mut selected_headings = vec![first.heading_path.clone()];
    let mut selected = vec![first];
    let mut penalty_total = 0.0;

    while selected.len() < limit && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_mmr = f32::MIN;
        let mut best_penalty = 0.0;

        for (idx, candidate) in remaining.iter().enumerate() {
            let mut penalty = 0.0;
            if selected_doc_ids.contains(&candidate.doc_id) {
                penalty += config.doc_repeat_penalty * (1.1 - doc_entropy);
            }
            if selected_headings.contains(&candidate.heading_path) {
                penalty += config.heading_repeat_penalty;
            }
            let mmr = lambda * candidate.score - (1.0 - lambda) * penalty;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_idx = idx;
                best_penalty = penalty;
            }
        }

        let picked = remaining.remove(best_idx);
        selected_doc_ids.push(picked.doc_id.clone());
        selected_headings.push(picked.heading_path.clone());
        penalty_total += best_penalty;
        selected.push(picked);
    }

    (selected, penalty_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;

    fn result(id: i64, doc_id: &str, heading: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id,
            text: String::new(),
            source_file: String::new(),
            doc_id: doc_id.into(),
            page: 1,
            heading_path: heading.into(),
            heading_level: 0,
            chunk_type: ChunkType::Text,
            score,
            semantic_rank: None,
            keyword_rank: None,
            rerank_rank: None,
            trust_score: 1.0,
            is_exploration: false,
            stability: 1.0,
        }
    }

    #[test]
    fn single_result_is_unchanged() {
        let fused = vec![result(1, "a", "h1", 1.0)];
        let (out, penalty) = diversify(&fused, 5, 0.5, 0.5, &MmrConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(penalty, 0.0);
    }

    #[test]
    fn penalizes_repeated_document() {
        let fused = vec![
            result(1, "doc-a", "h1", 1.0),
            result(2, "doc-a", "h2", 0.9),
            result(3, "doc-b", "h3", 0.85),
        ];
        let (out, penalty) = diversify(&fused, 3, 0.5, 0.5, &MmrConfig::default());
        // doc-b should be preferred over the second doc-a chunk despite lower raw score.
        assert_eq!(out[1].chunk_id, 3);
        assert!(penalty > 0.0);
    }

    #[test]
    fn lambda_clamped_to_bounds() {
        let config = MmrConfig::default();
        let lambda = select_lambda("a", Intent::General, &config);
        assert!(lambda >= config.lambda_min && lambda <= config.lambda_max);
        let lambda_summary = select_lambda(
            "explain the overview of this entire chapter in detail please",
            Intent::Summary,
            &config,
        );
        assert!(lambda_summary >= lambda);
    }

    #[test]
    fn entropy_tracker_warms_up_then_stabilizes() {
        let mut tracker = DocEntropyTracker::new();
        let config = MmrConfig { warm_session_count: 2, ..MmrConfig::default() };
        let diverse = vec![result(1, "a", "h", 1.0), result(2, "b", "h", 1.0)];
        tracker.update(&diverse, &config);
        assert!(tracker.current() > 0.0);
    }
}
