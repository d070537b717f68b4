//! Database Migrations
//!
//! Schema evolution through monotonically numbered migrations, applied in
//! order against SQLite's own `PRAGMA user_version` integer rather than a
//! custom tracking table — there's nothing the core needs from a richer
//! table (per-migration timestamps, description persistence) that the
//! built-in counter doesn't already give it, and one fewer table is one
//! fewer thing that can drift out of sync with the schema it's describing.

/// Migration definitions, applied cumulatively in ascending version order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: embeddings, embeddings_fts, retrieval_logs, workspace_metadata",
    up: MIGRATION_V1_UP,
}];

/// A database migration. Migrations are additive only — new columns
/// default-null, new tables `IF NOT EXISTS` — so replaying one that has
/// already been applied is always safe.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    page INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    embedding_model TEXT NOT NULL,
    embedding_dimension INTEGER NOT NULL,
    heading_path TEXT NOT NULL DEFAULT '',
    heading_level INTEGER NOT NULL DEFAULT 0,
    chunk_type TEXT NOT NULL DEFAULT 'text',
    list_type TEXT,
    list_length INTEGER,
    sentence_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    boost_factor REAL NOT NULL DEFAULT 1.0
);

CREATE INDEX IF NOT EXISTS idx_embeddings_doc_id ON embeddings(doc_id);
CREATE INDEX IF NOT EXISTS idx_embeddings_chunk_type ON embeddings(chunk_type);

-- Inverted index content is the normalized heading path plus chunk text,
-- joined as "[CONTEXT: <tokens>] <text>" (§3) so heading words influence
-- sparse matches without polluting the stored chunk text column.
CREATE VIRTUAL TABLE IF NOT EXISTS embeddings_fts USING fts5(
    indexed_text,
    content = 'embeddings',
    content_rowid = 'id'
);

CREATE TRIGGER IF NOT EXISTS embeddings_fts_insert AFTER INSERT ON embeddings BEGIN
    INSERT INTO embeddings_fts(rowid, indexed_text)
    VALUES (
        new.id,
        '[CONTEXT: ' || replace(replace(replace(new.heading_path, '>', ' '), '/', ' '), '.', ' ') || '] ' || new.text
    );
END;

-- External-content FTS5 tables require the original indexed value on
-- delete, not an empty placeholder, or the index's internal structures
-- drift out of sync with the content table.
CREATE TRIGGER IF NOT EXISTS embeddings_fts_delete AFTER DELETE ON embeddings BEGIN
    INSERT INTO embeddings_fts(embeddings_fts, rowid, indexed_text)
    VALUES (
        'delete',
        old.id,
        '[CONTEXT: ' || replace(replace(replace(old.heading_path, '>', ' '), '/', ' '), '.', ' ') || '] ' || old.text
    );
END;

CREATE TABLE IF NOT EXISTS retrieval_logs (
    id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    semantic_rank INTEGER,
    keyword_rank INTEGER,
    final_rank INTEGER NOT NULL,
    latency_embedding_ms REAL NOT NULL DEFAULT 0,
    latency_search_ms REAL NOT NULL DEFAULT 0,
    latency_fusion_ms REAL NOT NULL DEFAULT 0,
    latency_rerank_ms REAL NOT NULL DEFAULT 0,
    top_score REAL NOT NULL DEFAULT 0,
    mmr_penalty_total REAL NOT NULL DEFAULT 0,
    is_exploration INTEGER NOT NULL DEFAULT 0,
    rank_delta INTEGER,
    stability REAL NOT NULL DEFAULT 1.0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_retrieval_logs_query ON retrieval_logs(query);
CREATE INDEX IF NOT EXISTS idx_retrieval_logs_created_at ON retrieval_logs(created_at);

CREATE TABLE IF NOT EXISTS workspace_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Read the current schema version from SQLite's own `user_version`
/// pragma.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT user_version FROM pragma_user_version", [], |row| row.get(0))
}

/// Apply every migration newer than the stored version, in ascending
/// order, updating `user_version` after each.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            conn.execute_batch(migration.up)?;
            conn.pragma_update(None, "user_version", migration.version)?;
            applied += 1;
        }
    }

    Ok(applied)
}
