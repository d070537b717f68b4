//! Aggregated tunables for the retrieval pipeline.
//!
//! Every magic number named in §4 lives here instead of scattered through
//! the pipeline modules, constructed once per workspace and threaded
//! through the engine.

/// Reciprocal-rank fusion constant (§4.6).
pub const RRF_K: f32 = 60.0;

/// Intent-aware fusion weights and retrieval-limit multiplier (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct IntentWeights {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub retrieval_limit_multiplier: usize,
}

/// Tunables for the query cache (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub capacity: usize,
    pub semantic_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            semantic_threshold: 0.95,
        }
    }
}

/// Tunables for the latency-driven degradation ladder (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct LatencyConfig {
    pub ema_alpha: f32,
    pub ema_seed_ms: f32,
    pub shrink_threshold_ms: f32,
    pub bypass_threshold_ms: f32,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            ema_seed_ms: 100.0,
            shrink_threshold_ms: 1500.0,
            bypass_threshold_ms: 4000.0,
        }
    }
}

/// Tunables for the stability regulator (§4.7).
#[derive(Debug, Clone, Copy)]
pub struct StabilityConfig {
    pub history_window: usize,
    pub delta_scale: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            delta_scale: 5.0,
        }
    }
}

/// Tunables for adaptive MMR (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct MmrConfig {
    pub enabled: bool,
    pub lambda_min: f32,
    pub lambda_max: f32,
    pub doc_repeat_penalty: f32,
    pub heading_repeat_penalty: f32,
    pub entropy_ema_alpha_warm: f32,
    pub entropy_ema_alpha_stable: f32,
    pub warm_session_count: u32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lambda_min: 0.2,
            lambda_max: 0.8,
            doc_repeat_penalty: 0.15,
            heading_repeat_penalty: 0.1,
            entropy_ema_alpha_warm: 0.3,
            entropy_ema_alpha_stable: 0.1,
            warm_session_count: 10,
        }
    }
}

/// Tunables for the exploration probe (§4.9).
#[derive(Debug, Clone, Copy)]
pub struct ExplorationConfig {
    pub enabled: bool,
    pub min_stability: f32,
    pub min_cosine: f32,
    pub max_trust_score: f32,
    pub score_ratio: f32,
    pub insert_rank: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_stability: 0.6,
            min_cosine: 0.65,
            max_trust_score: 1.0,
            score_ratio: 0.95,
            insert_rank: 2,
        }
    }
}

/// Tunables for cross-encoder rerank calibration (§4.10).
#[derive(Debug, Clone, Copy)]
pub struct RerankConfig {
    pub enabled: bool,
    pub candidate_count: usize,
    pub text_truncate_chars: usize,
    pub ema_alpha: f32,
    pub outlier_z: f32,
    pub drift_threshold: f32,
    pub drift_min_samples: u32,
    pub frozen_variance_threshold: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            candidate_count: 10,
            text_truncate_chars: 500,
            ema_alpha: 0.15,
            outlier_z: 5.0,
            drift_threshold: 0.4,
            drift_min_samples: 5,
            frozen_variance_threshold: 0.001,
        }
    }
}

/// Aggregated retrieval-pipeline configuration for one workspace.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub cache: CacheConfig,
    pub latency: LatencyConfig,
    pub stability: StabilityConfig,
    pub mmr: MmrConfig,
    pub exploration: ExplorationConfig,
    pub rerank: RerankConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            latency: LatencyConfig::default(),
            stability: StabilityConfig::default(),
            mmr: MmrConfig::default(),
            exploration: ExplorationConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

/// Intent-aware weight table (§4.6). Returns `(weights, base_retrieval_limit_multiplier)`.
pub fn intent_weights(intent: crate::search::intent::Intent) -> IntentWeights {
    use crate::search::intent::Intent;
    match intent {
        Intent::Definition | Intent::Procedure => IntentWeights {
            semantic_weight: 0.35,
            keyword_weight: 0.65,
            retrieval_limit_multiplier: 3,
        },
        Intent::Summary => IntentWeights {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            retrieval_limit_multiplier: 6,
        },
        Intent::General | Intent::Example => IntentWeights {
            semantic_weight: 0.5,
            keyword_weight: 0.5,
            retrieval_limit_multiplier: 4,
        },
    }
}

/// Intent-dependent stability bias factor (§4.7).
pub fn stability_bias_factor(intent: crate::search::intent::Intent) -> f32 {
    use crate::search::intent::Intent;
    match intent {
        Intent::Definition => 2.0,
        Intent::Procedure => 1.5,
        Intent::Summary => 1.0,
        Intent::General | Intent::Example => 0.5,
    }
}
