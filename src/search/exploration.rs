//! Exploration probe (§4.9): deliberately inserts an uncertain candidate at
//! rank 2 to acquire feedback, quarantining its clicks from the boost
//! signal so a single curious click can't inflate a chunk's trust score.

use crate::chunk::RetrievalResult;
use crate::config::ExplorationConfig;
use crate::search::dense::DenseHit;
use crate::search::intent::Intent;

/// Eligibility gate: exploration enabled, stability high enough to afford
/// the risk, intent not one of the precision-critical ones, and a
/// non-empty result list.
pub fn is_eligible(
    config: &ExplorationConfig,
    stability: f32,
    intent: Intent,
    results: &[RetrievalResult],
) -> bool {
    config.enabled
        && stability >= config.min_stability
        && !matches!(intent, Intent::Definition | Intent::Procedure)
        && !results.is_empty()
}

/// Find the first dense hit beyond `limit` whose chunk has never been
/// clicked (`trust_score <= max_trust_score`) and whose raw cosine exceeds
/// `min_cosine`.
fn find_probe<'a>(dense: &'a [DenseHit], limit: usize, config: &ExplorationConfig) -> Option<&'a DenseHit> {
    dense
        .iter()
        .skip(limit)
        .find(|hit| hit.trust_score <= config.max_trust_score && hit.score > config.min_cosine)
}

/// Insert an exploration probe at `insert_rank` (1-indexed) into `results`
/// if one is found among `dense` beyond `limit`, scored at
/// `top_score * score_ratio`. Returns the (possibly unchanged) list.
pub fn insert_probe(
    mut results: Vec<RetrievalResult>,
    dense: &[DenseHit],
    limit: usize,
    config: &ExplorationConfig,
) -> Vec<RetrievalResult> {
    let Some(top_score) = results.first().map(|r| r.score) else {
        return results;
    };

    let Some(probe_hit) = find_probe(dense, limit, config) else {
        return results;
    };

    let probe = RetrievalResult {
        chunk_id: probe_hit.chunk.id,
        text: probe_hit.chunk.text.clone(),
        source_file: probe_hit.chunk.source_file.clone(),
        doc_id: probe_hit.chunk.doc_id.clone(),
        page: probe_hit.chunk.page,
        heading_path: probe_hit.chunk.heading_path.clone(),
        heading_level: probe_hit.chunk.heading_level,
        chunk_type: probe_hit.chunk.chunk_type.clone(),
        score: top_score * config.score_ratio,
        semantic_rank: None,
        keyword_rank: None,
        rerank_rank: None,
        trust_score: probe_hit.trust_score,
        is_exploration: true,
        stability: results.first().map(|r| r.stability).unwrap_or(1.0),
    };

    let insert_at = (config.insert_rank - 1).min(results.len());
    results.insert(insert_at, probe);
    results
}

/// Whether a recorded interaction should increment `boost_factor` (§4.9,
/// §6): only non-exploration clicks ever do.
pub fn should_increment_boost(is_exploration: bool) -> bool {
    !is_exploration
}
