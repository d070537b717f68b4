//! Rank-stability regulator (§4.7): biases high-trust intents toward
//! rankings that have held steady across recent queries, while letting
//! exploratory intents drift.

use crate::chunk::RetrievalResult;
use crate::config::{stability_bias_factor, StabilityConfig};
use crate::search::intent::Intent;

/// `stability = max(0, 1 − avgDelta/5)` over at most the `history_window`
/// most recent non-exploration retrieval-log rows for the exact query.
/// Absent history defaults to full stability (1.0) — a fresh workspace, or
/// a schema version that never populated `rank_delta`, must not crash the
/// regulator (§9 open question).
pub fn compute_stability(recent_rank_deltas: &[i32], config: &StabilityConfig) -> f32 {
    if recent_rank_deltas.is_empty() {
        return 1.0;
    }
    let window = &recent_rank_deltas[..recent_rank_deltas.len().min(config.history_window)];
    let avg_abs_delta: f32 =
        window.iter().map(|d| d.unsigned_abs() as f32).sum::<f32>() / window.len() as f32;
    (1.0 - avg_abs_delta / config.delta_scale).max(0.0)
}

/// Apply the intent-dependent stability bias to every candidate's fused
/// score and re-sort descending.
pub fn apply_stability_bias(results: &mut [RetrievalResult], stability: f32, intent: Intent) {
    let bias = stability * stability_bias_factor(intent) * 0.1;
    for result in results.iter_mut() {
        result.score += bias;
        result.stability = stability;
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;

    fn result(id: i64, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id,
            text: String::new(),
            source_file: String::new(),
            doc_id: String::new(),
            page: 1,
            heading_path: String::new(),
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
    fn absent_history_defaults_to_full_stability() {
        assert_eq!(compute_stability(&[], &StabilityConfig::default()), 1.0);
    }

    #[test]
    fn averages_over_window_and_caps_at_zero() {
        let config = StabilityConfig::default();
        assert!((compute_stability(&[5, 5, 5], &config) - 0.0).abs() < 1e-6);
        assert!((compute_stability(&[1, 1, 1], &config) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn window_caps_at_history_window_most_recent() {
        let config = StabilityConfig { history_window: 2, delta_scale: 5.0 };
        // Only the first two entries should count.
        assert!((compute_stability(&[0, 0, 10, 10], &config) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bias_rewards_definition_more_than_general() {
        let mut def = vec![result(1, 1.0)];
        let mut gen = vec![result(1, 1.0)];
        apply_stability_bias(&mut def, 1.0, Intent::Definition);
        apply_stability_bias(&mut gen, 1.0, Intent::General);
        assert!(def[0].score > gen[0].score);
    }

    #[test]
    fn bias_resorts_descending() {
        let mut results = vec![result(1, 0.1), result(2, 0.5)];
        apply_stability_bias(&mut results, 1.0, Intent::Definition);
        assert_eq!(results[0].chunk_id, 2);
    }
}
