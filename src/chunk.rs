//! Chunk data model
//!
//! A [`Chunk`] is the indexed unit the retrieval core operates on. Chunks are
//! produced by an ingestion collaborator (layout parsing, heading detection,
//! chunk typing — all out of scope here) and handed to the store already
//! carrying an embedding vector and structural metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open set of structural chunk-type tags.
///
/// New tags can be introduced by ingestion without a core change — unknown
/// tags round-trip as [`ChunkType::Other`] rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
    Summary,
    Definition,
    Example,
    List,
    Code,
    Table,
    /// Any tag outside the known set, preserved verbatim.
    Other(String),
}

impl ChunkType {
    pub fn as_str(&self) -> &str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Summary => "summary",
            ChunkType::Definition => "definition",
            ChunkType::Example => "example",
            ChunkType::List => "list",
            ChunkType::Code => "code",
            ChunkType::Table => "table",
            ChunkType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => ChunkType::Text,
            "summary" => ChunkType::Summary,
            "definition" => ChunkType::Definition,
            "example" => ChunkType::Example,
            "list" => ChunkType::List,
            "code" => ChunkType::Code,
            "table" => ChunkType::Table,
            other => ChunkType::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single indexed text unit with structural metadata and an embedding.
///
/// Never mutated after insertion except for `boost_factor`, which accumulates
/// feedback from non-exploration interactions (see `record_interaction`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Monotonic integer identifier assigned by the store on insert.
    pub id: i64,
    /// Display name of the source document.
    pub source_file: String,
    /// Stable document identifier (content hash), shared by all chunks of
    /// the same source document.
    pub doc_id: String,
    /// 1-indexed page number within the source document.
    pub page: i32,
    /// Intra-document ordinal of this chunk.
    pub chunk_index: i32,
    /// The chunk's text body.
    pub text: String,
    /// Dense embedding vector, fixed dimension per workspace.
    pub embedding: Vec<f32>,
    /// Signature of the model that produced `embedding`.
    pub embedding_model: String,
    /// `embedding.len()`, stored redundantly so dimension checks don't
    /// require decoding the blob.
    pub embedding_dimension: usize,
    /// Hierarchical breadcrumb, e.g. `"Chapter 3 > 3.2 Caches"`.
    pub heading_path: String,
    /// Depth of `heading_path`; 0 for an unheaded chunk.
    pub heading_level: i32,
    /// Structural type tag.
    pub chunk_type: ChunkType,
    /// List kind, when `chunk_type == List` (e.g. "bulleted", "numbered").
    pub list_type: Option<String>,
    /// Number of list items, when `chunk_type == List`.
    pub list_length: Option<i32>,
    /// Sentence count of `text`, as estimated by the ingestion collaborator.
    pub sentence_count: i32,
    pub created_at: DateTime<Utc>,
    /// Accumulated user-interaction feedback. Starts at 1.0, never negative.
    pub boost_factor: f32,
}

/// Search-mode hint accepted by the engine's staged query API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

/// A chunk enriched with retrieval-stage scoring for return to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub chunk_id: i64,
    pub text: String,
    pub source_file: String,
    pub doc_id: String,
    pub page: i32,
    pub heading_path: String,
    pub heading_level: i32,
    pub chunk_type: ChunkType,
    /// Final fused (and possibly reranked/diversified) score.
    pub score: f32,
    /// 1-indexed rank in the dense result list, if present there.
    pub semantic_rank: Option<usize>,
    /// 1-indexed rank in the sparse result list, if present there.
    pub keyword_rank: Option<usize>,
    /// 1-indexed position this candidate held in the fused list *before*
    /// cross-encoder reranking reordered it, if that stage ran (§4.10:
    /// "the original pre-rerank position preserved as `rerankRank`").
    pub rerank_rank: Option<usize>,
    pub trust_score: f32,
    pub is_exploration: bool,
    /// Stability score computed for the query that produced this result.
    pub stability: f32,
}

/// Append-only record of a single query's pipeline behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalLogEntry {
    pub id: String,
    pub query: String,
    pub semantic_rank: Option<i32>,
    pub keyword_rank: Option<i32>,
    pub final_rank: i32,
    pub latency_embedding_ms: f64,
    pub latency_search_ms: f64,
    pub latency_fusion_ms: f64,
    pub latency_rerank_ms: f64,
    pub top_score: f32,
    pub mmr_penalty_total: f32,
    pub is_exploration: bool,
    pub rank_delta: i32,
    pub stability: f32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_type_roundtrip() {
        for t in [
            ChunkType::Text,
            ChunkType::Summary,
            ChunkType::Definition,
            ChunkType::Example,
            ChunkType::List,
            ChunkType::Code,
            ChunkType::Table,
        ] {
            assert_eq!(ChunkType::parse(t.as_str()), t);
        }
    }

    #[test]
    fn chunk_type_unknown_round_trips_as_other() {
        let parsed = ChunkType::parse("footnote");
        assert_eq!(parsed, ChunkType::Other("footnote".to_string()));
        assert_eq!(parsed.as_str(), "footnote");
    }
}
