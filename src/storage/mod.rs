//! Storage Module
//!
//! SQLite-backed persistent store: schema migrations against the built-in
//! `user_version` counter, chunk records with an FTS5 inverted index,
//! append-only retrieval logs, and key/value workspace metadata.

mod migrations;
mod sqlite;

pub use migrations::{Migration, MIGRATIONS};
pub use sqlite::{Store, EMBEDDING_DIMENSION_KEY};
