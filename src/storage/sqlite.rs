//! SQLite Storage Implementation
//!
//! One embedded database file per workspace (§6). A writer/reader
//! connection split gives every read a consistent view without blocking on
//! the single writer; both connections point at the same file and observe
//! each other's committed writes under WAL.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::chunk::{Chunk, ChunkType, RetrievalLogEntry};
use crate::error::{RetrievalError, Result};
use crate::search::sanitize_fts5_query;
use crate::vector::{blob_to_vector, vector_to_blob};

use super::migrations::apply_migrations;

/// Reserved workspace-metadata key holding the registered embedding
/// dimension guardrail (§3, §6).
pub const EMBEDDING_DIMENSION_KEY: &str = "embedding_dimension";

/// Embedded store for one workspace: chunks, the FTS5 inverted index,
/// retrieval logs, and key/value metadata.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;
             PRAGMA journal_size_limit = 67108864;",
        )?;
        Ok(())
    }

    /// Open (creating if absent) the database file at `path`, applying any
    /// pending migrations on the writer connection. Open failure is fatal
    /// (§4.1, §7) — propagated as `Err` rather than degraded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            path,
        })
    }

    /// Open a fresh, empty, migrated workspace backed by an in-memory
    /// database. Useful for tests and ephemeral sessions.
    ///
    /// A second connection to the *same* in-memory database needs a named
    /// shared-cache URI — plain `:memory:` would open an unrelated,
    /// unmigrated database for the reader. The name is randomized so
    /// concurrently-running tests never share a cache with each other.
    pub fn open_in_memory() -> Result<Self> {
        use rusqlite::OpenFlags;

        let uri = format!("file:retrieval-core-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer_conn)?;
        apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            path: PathBuf::from(uri),
        })
    }

    /// Close this handle and open a different workspace file in its place
    /// (§6 workspace switch). The caller's existing `Store` value is
    /// replaced by the one returned.
    pub fn switch_workspace(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned("writer connection".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned("reader connection".into()))
    }

    /// The workspace's registered embedding dimension, if one has been set.
    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        Ok(self
            .get_metadata(EMBEDDING_DIMENSION_KEY)?
            .and_then(|v| v.parse::<usize>().ok()))
    }

    /// Register (or overwrite) the workspace's embedding dimension
    /// guardrail.
    pub fn set_embedding_dimension(&self, dimension: usize) -> Result<()> {
        self.set_metadata(EMBEDDING_DIMENSION_KEY, &dimension.to_string())
    }

    /// Validate a vector's dimension against the registered guardrail
    /// (§3, §4.2). Returns `DimensionUnset` if no dimension is registered
    /// yet, `DimensionMismatch` if it disagrees.
    pub fn check_dimension(&self, vector_len: usize) -> Result<()> {
        match self.embedding_dimension()? {
            None => Err(RetrievalError::DimensionUnset),
            Some(expected) if expected != vector_len => {
                Err(RetrievalError::DimensionMismatch { expected, got: vector_len })
            }
            Some(_) => Ok(()),
        }
    }

    /// Insert a chunk (atomic with its full-text-index row, via an AFTER
    /// INSERT trigger — §3 invariant: an FTS row exists iff the chunk row
    /// exists). Returns the assigned id, or logs and returns `None` on
    /// failure without aborting a batch (§4.1 failure semantics).
    pub fn insert_chunk(&self, chunk: &Chunk) -> Option<i64> {
        match self.try_insert_chunk(chunk) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, source_file = %chunk.source_file, "chunk insert failed");
                None
            }
        }
    }

    fn try_insert_chunk(&self, chunk: &Chunk) -> Result<i64> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO embeddings (
                source_file, doc_id, page, chunk_index, text, embedding,
                embedding_model, embedding_dimension, heading_path, heading_level,
                chunk_type, list_type, list_length, sentence_count, created_at, boost_factor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                chunk.source_file,
                chunk.doc_id,
                chunk.page,
                chunk.chunk_index,
                chunk.text,
                vector_to_blob(&chunk.embedding),
                chunk.embedding_model,
                chunk.embedding_dimension as i64,
                chunk.heading_path,
                chunk.heading_level,
                chunk.chunk_type.as_str(),
                chunk.list_type,
                chunk.list_length,
                chunk.sentence_count,
                chunk.created_at.to_rfc3339(),
                chunk.boost_factor,
            ],
        )?;
        Ok(writer.last_insert_rowid())
    }

    fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
        let embedding_blob: Vec<u8> = row.get("embedding")?;
        let created_at_raw: String = row.get("created_at")?;
        let chunk_type_raw: String = row.get("chunk_type")?;

        Ok(Chunk {
            id: row.get("id")?,
            source_file: row.get("source_file")?,
            doc_id: row.get("doc_id")?,
            page: row.get("page")?,
            chunk_index: row.get("chunk_index")?,
            text: row.get("text")?,
            embedding: blob_to_vector(&embedding_blob).unwrap_or_default(),
            embedding_model: row.get("embedding_model")?,
            embedding_dimension: row.get::<_, i64>("embedding_dimension")? as usize,
            heading_path: row.get("heading_path")?,
            heading_level: row.get("heading_level")?,
            chunk_type: ChunkType::parse(&chunk_type_raw),
            list_type: row.get("list_type")?,
            list_length: row.get("list_length")?,
            sentence_count: row.get("sentence_count")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            boost_factor: row.get("boost_factor")?,
        })
    }

    /// Full scan of every chunk, for brute-force dense search (§4.2).
    /// Empty store returns an empty vector.
    pub fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM embeddings")?;
        let rows = stmt.query_map([], Self::row_to_chunk)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    /// Keyword search through the FTS5 index (§4.3). The query string is
    /// sanitized into quoted AND-joined tokens but otherwise passed through
    /// verbatim; a MATCH syntax error degrades to an empty result rather
    /// than propagating past the API boundary.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<Chunk>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT c.* FROM embeddings c
             JOIN embeddings_fts fts ON c.id = fts.rowid
             WHERE embeddings_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![sanitized, limit as i64], Self::row_to_chunk);
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, query, "keyword search query failed, returning empty result");
                return Ok(Vec::new());
            }
        };

        let mut chunks = Vec::new();
        for row in rows {
            match row {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    tracing::warn!(error = %e, query, "keyword search row decode failed, returning empty result");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(chunks)
    }

    /// Increment `boost_factor` for a chunk by `amount` (never below zero).
    /// Callers must only invoke this for non-exploration interactions
    /// (§4.9) — quarantine is enforced by the caller, not here.
    pub fn boost_chunk(&self, chunk_id: i64, amount: f32) -> Result<()> {
        let writer = self.writer()?;
        let updated = writer.execute(
            "UPDATE embeddings SET boost_factor = MAX(0.0, boost_factor + ?1) WHERE id = ?2",
            params![amount, chunk_id],
        )?;
        if updated == 0 {
            return Err(RetrievalError::ChunkNotFound(chunk_id));
        }
        Ok(())
    }

    /// Read a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let reader = self.reader()?;
        Ok(reader
            .query_row("SELECT value FROM workspace_metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Upsert a metadata value (§3: metadata rows are upserted).
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO workspace_metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Append one retrieval-log row (§4.11). Append-only — never mutated.
    pub fn append_retrieval_log(&self, entry: &RetrievalLogEntry) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO retrieval_logs (
                id, query, semantic_rank, keyword_rank, final_rank,
                latency_embedding_ms, latency_search_ms, latency_fusion_ms, latency_rerank_ms,
                top_score, mmr_penalty_total, is_exploration, rank_delta, stability, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.id,
                entry.query,
                entry.semantic_rank,
                entry.keyword_rank,
                entry.final_rank,
                entry.latency_embedding_ms,
                entry.latency_search_ms,
                entry.latency_fusion_ms,
                entry.latency_rerank_ms,
                entry.top_score,
                entry.mmr_penalty_total,
                entry.is_exploration,
                entry.rank_delta,
                entry.stability,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Absolute `rank_delta` values from the most recent non-exploration
    /// log rows for `query`, most recent first, capped at `limit` (§4.7).
    /// Rows from a schema version that never populated `rank_delta` are
    /// skipped rather than treated as zero (§9 open question).
    pub fn recent_rank_deltas(&self, query: &str, limit: usize) -> Result<Vec<i32>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT rank_delta FROM retrieval_logs
             WHERE query = ?1 AND is_exploration = 0 AND rank_delta IS NOT NULL
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], |row| row.get::<_, i32>(0))?;
        let mut deltas = Vec::new();
        for row in rows {
            deltas.push(row?);
        }
        Ok(deltas)
    }

    /// Total chunk count.
    pub fn chunk_count(&self) -> Result<i64> {
        let reader = self.reader()?;
        Ok(reader.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?)
    }

    /// Delete every chunk (and, via trigger, its FTS row). Retrieval logs
    /// and metadata are untouched.
    pub fn clear(&self) -> Result<()> {
        let writer = self.writer()?;
        writer.execute("DELETE FROM embeddings", [])?;
        Ok(())
    }
}
