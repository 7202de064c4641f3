//! Schema creation and forward-only migrations (spec.md §4.4: "applies
//! forward-only migrations... interrupted migrations leave version
//! unchanged"). Grounded on the teacher's `storage/persistence/sqlite.rs`
//! DDL and `storage/migrations.rs` version-row pattern, adapted to run
//! synchronously against SQLite instead of async against Postgres.

use crate::error::IndexErrorKind;
use crate::Error;
use rusqlite::Connection;

/// Current schema version. Bump and append a migration when the schema
/// changes.
pub const CURRENT_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
    CREATE TABLE IF NOT EXISTS memories (
        id TEXT PRIMARY KEY,
        commit_sha TEXT NOT NULL,
        namespace TEXT NOT NULL,
        repo_path TEXT NOT NULL,
        summary TEXT NOT NULL,
        body TEXT NOT NULL,
        tags_json TEXT NOT NULL DEFAULT '[]',
        timestamp TEXT NOT NULL,
        spec TEXT,
        phase TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        relates_to_json TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vectors (
        id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
        embedding BLOB NOT NULL,
        dimensions INTEGER NOT NULL
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS fts USING fts5(
        id UNINDEXED,
        summary,
        body,
        tokenize = 'porter unicode61'
    );

    CREATE TABLE IF NOT EXISTS note_blobs (
        commit_sha TEXT NOT NULL,
        namespace TEXT NOT NULL,
        blob_sha TEXT NOT NULL,
        PRIMARY KEY (commit_sha, namespace)
    );

    CREATE TABLE IF NOT EXISTS index_dimensions (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        dimensions INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS access_log (
        id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
        last_accessed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_memories_namespace_spec_ts
        ON memories(namespace, spec, timestamp DESC);
    CREATE INDEX IF NOT EXISTS idx_memories_status_ts
        ON memories(status, timestamp);
    CREATE INDEX IF NOT EXISTS idx_memories_repo_namespace
        ON memories(repo_path, namespace);
    CREATE INDEX IF NOT EXISTS idx_memories_commit_sha
        ON memories(commit_sha);
    ";

const MIGRATIONS: &[(i64, &str)] = &[(1, SCHEMA_V1)];

/// Creates the schema at [`CURRENT_VERSION`] and applies any migrations not
/// yet recorded. Every migration runs inside a single transaction that
/// atomically records the new version row; an interrupted migration leaves
/// the version unchanged (spec.md §4.4).
///
/// # Errors
///
/// Returns [`Error::Index`] with [`IndexErrorKind::Schema`] or
/// [`IndexErrorKind::Migration`] on failure.
pub fn init(conn: &mut Connection) -> Result<(), Error> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;

    tx.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")
        .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;

    let current: i64 = tx
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;

    for &(version, ddl) in MIGRATIONS {
        if version <= current {
            continue;
        }
        tx.execute_batch(ddl)
            .map_err(|e| Error::index(IndexErrorKind::Migration, format!("migration {version} failed: {e}")))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(|e| Error::index(IndexErrorKind::Migration, e.to_string()))?;
    }

    tx.commit()
        .map_err(|e| Error::index(IndexErrorKind::Migration, e.to_string()))?;
    Ok(())
}
