//! Cross-encoder rerank (§4.10).
//!
//! Concrete backends are a capability trait, not a polymorphic class
//! hierarchy (§9 Design Notes): `RerankBackend` exposes a single async
//! batch-scoring method. Adding a backend is a new impl, not a new
//! subclass. `HttpRerankBackend` talks to an external chat-style scoring
//! service; `StaticRerankBackend` is a deterministic in-memory double for
//! tests.

use async_trait::async_trait;

use crate::chunk::RetrievalResult;
use crate::config::RerankConfig;

/// A pluggable cross-encoder scoring backend. Implementors score a batch of
/// documents against one query and return floats in the same order.
#[async_trait]
pub trait RerankBackend: Send + Sync {
    /// Score `documents` against `query`, returning one float per document
    /// in 0..1, in the same order. Any backend failure (transport error,
    /// malformed JSON, wrong-length array) should be surfaced as `Err`; the
    /// caller treats that as backend-failure (§7) and returns the
    /// pre-rerank list unchanged.
    async fn score_batch(&self, query: &str, documents: &[&str]) -> crate::error::Result<Vec<f32>>;

    /// A stable identifier for this backend's underlying model, used as the
    /// `<model>_mean` / `<model>_std` metadata key prefix (§6).
    fn model_key(&self) -> &str;
}

/// HTTP-JSON rerank backend: posts `{query, documents}` and expects back a
/// JSON array of floats, one per document, in request order.
#[cfg(feature = "rerank")]
pub struct HttpRerankBackend {
    client: reqwest::Client,
    endpoint: String,
    model_key: String,
}

#[cfg(feature = "rerank")]
impl HttpRerankBackend {
    pub fn new(endpoint: impl Into<String>, model_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_key: model_key.into(),
        }
    }
}

#[cfg(feature = "rerank")]
#[derive(serde::Serialize)]
struct ScoreRequest<'a> {
    query: &'a str,
    documents: &'a [&'a str],
}

#[cfg(feature = "rerank")]
#[async_trait]
impl RerankBackend for HttpRerankBackend {
    async fn score_batch(&self, query: &str, documents: &[&str]) -> crate::error::Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ScoreRequest { query, documents })
            .send()
            .await
            .map_err(|e| crate::error::RetrievalError::RerankBackend(e.to_string()))?;

        let scores: Vec<f32> = response
            .json()
            .await
            .map_err(|e| crate::error::RetrievalError::RerankBackend(e.to_string()))?;

        if scores.len() != documents.len() {
            return Err(crate::error::RetrievalError::RerankBackend(format!(
                "backend returned {} scores for {} documents",
                scores.len(),
                documents.len()
            )));
        }

        Ok(scores)
    }

    fn model_key(&self) -> &str {
        &self.model_key
    }
}

/// Deterministic test double: a fixed score per document index, cycling if
/// there are more documents than scores.
pub struct StaticRerankBackend {
    pub scores: Vec<f32>,
    pub model_key: String,
}

#[async_trait]
impl RerankBackend for StaticRerankBackend {
    async fn score_batch(&self, _query: &str, documents: &[&str]) -> crate::error::Result<Vec<f32>> {
        Ok((0..documents.len())
            .map(|i| self.scores[i % self.scores.len().max(1)])
            .collect())
    }

    fn model_key(&self) -> &str {
        &self.model_key
    }
}

/// Rolling calibration statistics for one reranker model, persisted across
/// sessions under `<model>_mean` / `<model>_std` workspace metadata.
#[derive(Debug, Clone, Copy)]
pub struct RollingStats {
    pub mean: f32,
    pub std: f32,
    pub sample_count: u32,
    /// True once stats have been seeded (persisted or first-batch), which
    /// activates drift detection.
    pub initialized: bool,
}

impl RollingStats {
    /// Fresh, uninitialized stats — the first batch will seed them directly.
    pub fn fresh() -> Self {
        Self { mean: 0.5, std: 0.15, sample_count: 0, initialized: false }
    }

    /// Restore from persisted `<model>_mean` / `<model>_std` values. Marks
    /// the stats initialized so drift detection is active immediately.
    pub fn from_persisted(mean: f32, std: f32) -> Self {
        Self { mean, std, sample_count: 1, initialized: true }
    }
}

fn mean_of(xs: &[f32]) -> f32 {
    xs.iter().sum::<f32>() / xs.len() as f32
}

fn std_of(xs: &[f32], mean: f32) -> f32 {
    (xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / xs.len() as f32).sqrt()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Outcome of normalizing one rerank batch.
pub struct NormalizedBatch {
    /// Normalized score per surviving candidate, paired with its original
    /// index into the input slice (so `rerank_rank` can be reconstructed).
    pub scored: Vec<(usize, f32)>,
    /// True if this batch was detected as "frozen" (near-zero variance
    /// around 0.5) — an anomaly signal, not an error (§7).
    pub frozen: bool,
    /// True if a drift reset occurred while processing this batch.
    pub drifted: bool,
}

/// Normalize a raw score batch against (and possibly update) `stats`,
/// applying z-score calibration, outlier rejection, drift detection, and
/// the frozen-batch consistency check (§4.10).
pub fn normalize_batch(raw_scores: &[f32], stats: &mut RollingStats, config: &RerankConfig) -> NormalizedBatch {
    let mut drifted = false;

    if raw_scores.is_empty() {
        return NormalizedBatch { scored: Vec::new(), frozen: false, drifted: false };
    }

    let batch_mean = mean_of(raw_scores);
    let batch_std = std_of(raw_scores, batch_mean);
    let frozen_metric: f32 = raw_scores.iter().map(|s| (s - 0.5).powi(2)).sum();
    let frozen = frozen_metric < config.frozen_variance_threshold;

    if !stats.initialized {
        stats.mean = batch_mean;
        stats.std = batch_std.max(0.01);
        stats.sample_count = 1;
        stats.initialized = true;
    } else {
        if stats.sample_count >= config.drift_min_samples
            && (batch_mean - stats.mean).abs() > config.drift_threshold
        {
            stats.sample_count = 0;
            drifted = true;
        }

        if !frozen {
            stats.mean = (1.0 - config.ema_alpha) * stats.mean + config.ema_alpha * batch_mean;
            stats.std = (1.0 - config.ema_alpha) * stats.std + config.ema_alpha * batch_std.max(0.01);
        }
        stats.sample_count += 1;
    }

    let scored: Vec<(usize, f32)> = raw_scores
        .iter()
        .enumerate()
        .filter_map(|(idx, &raw)| {
            let z = ((raw - stats.mean) / stats.std.max(0.01)).clamp(-3.0, 3.0);
            let full_z = (raw - stats.mean) / stats.std.max(0.01);
            if full_z.abs() > config.outlier_z {
                return None;
            }
            Some((idx, sigmoid(z)))
        })
        .collect();

    NormalizedBatch { scored, frozen, drifted }
}

/// Apply normalized rerank scores to the top `candidate_count` fused
/// results, preserving each candidate's original position as `rerank_rank`.
/// Results beyond `candidate_count` are left untouched and appended after
/// the reranked head.
pub fn apply_rerank(mut results: Vec<RetrievalResult>, normalized: &NormalizedBatch, candidate_count: usize) -> Vec<RetrievalResult> {
    let head_len = results.len().min(candidate_count);
    let mut head: Vec<RetrievalResult> = results.drain(..head_len).collect();

    for &(idx, score) in &normalized.scored {
        if let Some(result) = head.get_mut(idx) {
            result.rerank_rank = Some(idx + 1);
            result.score = score;
        }
    }

    let kept: Vec<RetrievalResult> = normalized
        .scored
        .iter()
        .filter_map(|&(idx, _)| head.get(idx).cloned())
        .collect();

    let mut final_list = kept;
    final_list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    final_list.extend(results);
    final_list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_backend_scores_in_order() {
        let backend = StaticRerankBackend { scores: vec![0.1, 0.9], model_key: "test".into() };
        let scores = backend.score_batch("q", &["a", "b", "c"]).await.unwrap();
        assert_eq!(scores, vec![0.1, 0.9, 0.1]);
    }

    #[test]
    fn first_batch_initializes_stats_directly() {
        let mut stats = RollingStats::fresh();
        let config = RerankConfig::default();
        let batch = normalize_batch(&[0.2, 0.8, 0.5], &mut stats, &config);
        assert!(stats.initialized);
        assert_eq!(batch.scored.len(), 3);
    }

    #[test]
    fn normalized_scores_are_in_open_unit_interval_for_non_frozen_batch() {
        let mut stats = RollingStats::from_persisted(0.5, 0.15);
        let config = RerankConfig::default();
        let batch = normalize_batch(&[0.2, 0.4, 0.6, 0.8, 0.9], &mut stats, &config);
        assert!(!batch.frozen);
        for (_, score) in &batch.scored {
            assert!(*score > 0.0 && *score < 1.0);
        }
    }

    #[test]
    fn frozen_batch_does_not_update_stats() {
        let mut stats = RollingStats::from_persisted(0.5, 0.15);
        let config = RerankConfig::default();
        let before = (stats.mean, stats.std);
        let batch = normalize_batch(&[0.5, 0.5, 0.5, 0.501, 0.499], &mut stats, &config);
        assert!(batch.frozen);
        assert_eq!((stats.mean, stats.std), before);
    }

    #[test]
    fn drift_reset_after_min_samples() {
        let mut stats = RollingStats::from_persisted(0.5, 0.15);
        stats.sample_count = 5;
        let config = RerankConfig::default();
        let batch = normalize_batch(&[0.05, 0.05, 0.05, 0.05], &mut stats, &config);
        assert!(batch.drifted);
        assert_eq!(stats.sample_count, 1);
    }

    #[test]
    fn outlier_rejected_when_z_exceeds_threshold() {
        let mut stats = RollingStats::from_persisted(0.5, 0.01);
        let config = RerankConfig::default();
        // one score is wildly far from the mean relative to a tiny std.
        let batch = normalize_batch(&[0.5, 0.99], &mut stats, &config);
        assert_eq!(batch.scored.len(), 1);
        assert_eq!(batch.scored[0].0, 0);
    }
}
