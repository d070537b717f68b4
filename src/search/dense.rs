//! Brute-force dense vector search (§4.2).
//!
//! Workspaces are sized for in-memory traversal (tens of thousands of
//! chunks) — no approximate index. A full scan with a partial top-K sort is
//! both simpler and fast enough at this scale.

use chrono::Utc;

use crate::chunk::Chunk;
use crate::vector::{cosine_similarity, recency_factor};

/// One dense-search hit: the source chunk, its raw cosine score, and the
/// trust score derived from `boost_factor` and recency.
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub chunk: Chunk,
    pub score: f32,
    pub trust_score: f32,
}

/// Full-scan cosine similarity search over `chunks`, returning the top `k`
/// by descending score. Returns an empty vector for an empty store.
pub fn dense_search(chunks: &[Chunk], query: &[f32], k: usize) -> Vec<DenseHit> {
    if chunks.is_empty() || k == 0 {
        return Vec::new();
    }

    let now = Utc::now();
    let mut hits: Vec<DenseHit> = chunks
        .iter()
        .map(|chunk| {
            let score = cosine_similarity(&chunk.embedding, query);
            let age_seconds = (now - chunk.created_at).num_seconds().max(0) as f64;
            let trust_score = chunk.boost_factor * recency_factor(age_seconds);
            DenseHit {
                chunk: chunk.clone(),
                score,
                trust_score,
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;

    fn chunk(id: i64, embedding: Vec<f32>, boost_factor: f32) -> Chunk {
        Chunk {
            id,
            source_file: "doc.pdf".into(),
            doc_id: "doc-1".into(),
            page: 1,
            chunk_index: 0,
            text: format!("chunk {id}"),
            embedding,
            embedding_model: "test-model".into(),
            embedding_dimension: 3,
            heading_path: String::new(),
            heading_level: 0,
            chunk_type: ChunkType::Text,
            list_type: None,
            list_length: None,
            sentence_count: 1,
            created_at: Utc::now(),
            boost_factor,
        }
    }

    #[test]
    fn empty_store_returns_empty() {
        let hits = dense_search(&[], &[1.0, 0.0, 0.0], 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn ranks_by_descending_cosine() {
        let chunks = vec![
            chunk(1, vec![0.0, 1.0, 0.0], 1.0),
            chunk(2, vec![1.0, 0.0, 0.0], 1.0),
            chunk(3, vec![0.7, 0.7, 0.0], 1.0),
        ];
        let hits = dense_search(&chunks, &[1.0, 0.0, 0.0], 3);
        assert_eq!(hits[0].chunk.id, 2);
        assert_eq!(hits.len(), 3);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[test]
    fn truncates_to_k() {
        let chunks = vec![
            chunk(1, vec![1.0, 0.0, 0.0], 1.0),
            chunk(2, vec![0.9, 0.1, 0.0], 1.0),
            chunk(3, vec![0.1, 0.9, 0.0], 1.0),
        ];
        let hits = dense_search(&chunks, &[1.0, 0.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn zero_norm_query_yields_zero_scores_and_insertion_order() {
        let chunks = vec![chunk(1, vec![1.0, 0.0, 0.0], 1.0), chunk(2, vec![0.0, 1.0, 0.0], 1.0)];
        let hits = dense_search(&chunks, &[0.0, 0.0, 0.0], 2);
        assert!(hits.iter().all(|h| h.score == 0.0));
        assert_eq!(hits[0].chunk.id, 1);
        assert_eq!(hits[1].chunk.id, 2);
    }

    #[test]
    fn trust_score_reflects_boost_factor() {
        let chunks = vec![chunk(1, vec![1.0, 0.0, 0.0], 2.0)];
        let hits = dense_search(&chunks, &[1.0, 0.0, 0.0], 1);
        assert!((hits[0].trust_score - 2.0).abs() < 1e-4);
    }
}
