//! Sparse keyword search over the full-text index (§4.3).
//!
//! The query string is handed to SQLite FTS5 verbatim — no tokenization is
//! performed here. A malformed query (mismatched quotes, a bare `-` or `*`)
//! is a MATCH syntax error at the SQL level; the store degrades that to an
//! empty result rather than surfacing the error (§4.1 failure semantics).

use crate::chunk::Chunk;

/// One sparse-search hit. `score` is a constant placeholder — it carries no
/// meaning outside fusion, where only the *rank* is used.
#[derive(Debug, Clone)]
pub struct SparseHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Placeholder score assigned to every keyword match (§4.3).
pub const SPARSE_PLACEHOLDER_SCORE: f32 = 0.5;

/// Wrap chunks already fetched from the inverted index (in the store's
/// match-rank order) into [`SparseHit`]s, truncated to `limit`.
pub fn wrap_sparse_results(chunks: Vec<Chunk>, limit: usize) -> Vec<SparseHit> {
    chunks
        .into_iter()
        .take(limit)
        .map(|chunk| SparseHit {
            chunk,
            score: SPARSE_PLACEHOLDER_SCORE,
        })
        .collect()
}

/// Quote and escape a raw user query for safe embedding inside an FTS5
/// `MATCH` expression: each whitespace-delimited token becomes its own
/// double-quoted phrase (so operators like `-` or `*` inside a token lose
/// their special meaning), then the quoted tokens are joined with `AND`.
///
/// An empty or all-whitespace query sanitizes to an empty string; callers
/// should treat that as "no match" rather than submitting it to FTS5.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;
    use chrono::Utc;

    fn chunk(id: i64) -> Chunk {
        Chunk {
            id,
            source_file: "doc.pdf".into(),
            doc_id: "doc-1".into(),
            page: 1,
            chunk_index: 0,
            text: "text".into(),
            embedding: vec![],
            embedding_model: "test".into(),
            embedding_dimension: 0,
            heading_path: String::new(),
            heading_level: 0,
            chunk_type: ChunkType::Text,
            list_type: None,
            list_length: None,
            sentence_count: 1,
            created_at: Utc::now(),
            boost_factor: 1.0,
        }
    }

    #[test]
    fn sanitize_quotes_each_token() {
        assert_eq!(sanitize_fts5_query("cache eviction"), "\"cache\" AND \"eviction\"");
    }

    #[test]
    fn sanitize_escapes_embedded_quotes() {
        assert_eq!(sanitize_fts5_query("say \"hi\""), "\"say\" AND \"\"\"hi\"\"\"");
    }

    #[test]
    fn sanitize_empty_query_is_empty() {
        assert_eq!(sanitize_fts5_query("   "), "");
    }

    #[test]
    fn wrap_assigns_placeholder_score_and_respects_limit() {
        let chunks = vec![chunk(1), chunk(2), chunk(3)];
        let hits = wrap_sparse_results(chunks, 2);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == SPARSE_PLACEHOLDER_SCORE));
    }
}
