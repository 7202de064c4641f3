//! `IndexStore`: the single embedded store combining relational rows, a
//! vector table, and an FTS table (spec.md §4.4). Supersedes the teacher's
//! three-backend-trait split (`PersistenceBackend`/`IndexBackend`/
//! `VectorBackend`) with one struct, since this system has exactly one
//! storage engine rather than several pluggable ones.

mod connection;
mod row;
mod schema;
mod vector;

use crate::error::IndexErrorKind;
use crate::models::{Memory, MemoryId, MemoryResult, MemoryStatus, Namespace, SearchFilter};
use crate::Error;
use chrono::Utc;
use connection::Guarded;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

pub use row::MemoryRow;

/// Sparse patch applied by [`IndexStore::update`]. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    /// New lifecycle status.
    pub status: Option<MemoryStatus>,
    /// New body (used by archival compaction and editing).
    pub content: Option<String>,
    /// New tag set.
    pub tags: Option<Vec<String>>,
}

/// Aggregate counts returned by [`IndexStore::stats`].
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Row count per namespace.
    pub by_namespace: BTreeMap<String, usize>,
    /// Row count per project/topic slug (rows with no slug are omitted).
    pub by_spec: BTreeMap<String, usize>,
    /// Total row count.
    pub total: usize,
    /// On-disk size of the index file, in bytes.
    pub size_bytes: u64,
    /// Timestamp of the most recently captured memory, if any.
    pub last_capture: Option<chrono::DateTime<Utc>>,
}

/// Referential-drift report produced by [`IndexStore::verify`] (spec.md
/// §4.4: "scanning for referential drift").
#[derive(Debug, Clone, Default)]
pub struct IndexVerificationReport {
    /// `vectors` rows with no corresponding `memories` row.
    pub orphaned_vectors: usize,
    /// `fts` rows with no corresponding `memories` row.
    pub orphaned_fts: usize,
}

/// Embedded, single-file relational store augmented with a vector table
/// and a full-text table (spec.md §4.4).
pub struct IndexStore {
    conn: Guarded,
}

const UPSERT_BATCH_CHUNK: usize = 1_000;

impl IndexStore {
    /// Opens (creating if absent) the index database at `path` and applies
    /// schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] with [`IndexErrorKind::Corrupt`] if the file
    /// fails a consistency check on open, or [`IndexErrorKind::Schema`] /
    /// [`IndexErrorKind::Migration`] on initialization failure.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let guarded = Guarded::open(path)?;
        {
            let mut conn = guarded.acquire();
            check_integrity(&conn)?;
            schema::init(&mut conn)?;
        }
        Ok(Self { conn: guarded })
    }

    /// Opens an in-memory store, used by tests and by `full_reindex`'s
    /// interruption-safety strategy (build into a scratch db, then swap).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on initialization failure.
    pub fn open_in_memory() -> Result<Self, Error> {
        let guarded = Guarded::open_in_memory()?;
        {
            let mut conn = guarded.acquire();
            schema::init(&mut conn)?;
        }
        Ok(Self { conn: guarded })
    }

    /// Inserts or replaces one memory (and, if present, its embedding) in a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if an embedding is present whose
    /// dimension differs from the memory's existing vector dimension
    /// (I3), or [`Error::Index`] on a transaction failure.
    pub fn upsert(&self, memory: &Memory, embedding: Option<&[f32]>) -> Result<(), Error> {
        let mut conn = self.conn.acquire();
        let tx = conn.transaction().map_err(Error::from)?;
        upsert_one(&tx, memory, embedding)?;
        tx.commit().map_err(Error::from)?;
        Ok(())
    }

    /// Inserts or replaces many memories, chunked at
    /// [`UPSERT_BATCH_CHUNK`] with an intermediate commit per chunk to
    /// bound memory use (spec.md §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `memories` and `embeddings` differ
    /// in length, or [`Error::Index`] on a transaction failure.
    pub fn upsert_batch(&self, memories: &[Memory], embeddings: Option<&[Option<Vec<f32>>]>) -> Result<(), Error> {
        if let Some(embeddings) = embeddings {
            if embeddings.len() != memories.len() {
                return Err(Error::validation("embeddings", "length must match memories"));
            }
        }
        for chunk_start in (0..memories.len()).step_by(UPSERT_BATCH_CHUNK) {
            let chunk_end = (chunk_start + UPSERT_BATCH_CHUNK).min(memories.len());
            let mut conn = self.conn.acquire();
            let tx = conn.transaction().map_err(Error::from)?;
            for i in chunk_start..chunk_end {
                let embedding = embeddings.and_then(|e| e[i].as_deref());
                upsert_one(&tx, &memories[i], embedding)?;
            }
            tx.commit().map_err(Error::from)?;
        }
        Ok(())
    }

    /// Fetches one memory by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn get(&self, id: &MemoryId) -> Result<Option<Memory>, Error> {
        let conn = self.conn.acquire();
        conn.query_row(SELECT_MEMORY_COLUMNS, params![id.as_str()], row::memory_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// Fetches several memories, preserving `ids`' order; ids with no
    /// matching row are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn get_batch(&self, ids: &[MemoryId]) -> Result<Vec<Memory>, Error> {
        let conn = self.conn.acquire();
        let mut found = std::collections::HashMap::new();
        for id in ids {
            if let Some(memory) = conn
                .query_row(SELECT_MEMORY_COLUMNS, params![id.as_str()], row::memory_from_row)
                .optional()
                .map_err(Error::from)?
            {
                found.insert(id.as_str().to_string(), memory);
            }
        }
        Ok(ids.iter().filter_map(|id| found.remove(id.as_str())).collect())
    }

    /// K-nearest-neighbor vector search with scalar filters applied
    /// post hoc (spec.md §4.4: over-fetch, filter, truncate to `k`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn knn(&self, embedding: &[f32], k: usize, filters: &SearchFilter) -> Result<Vec<MemoryResult>, Error> {
        let conn = self.conn.acquire();
        let mut stmt = conn
            .prepare("SELECT id, embedding FROM vectors")
            .map_err(Error::from)?;
        let rows: Vec<(String, Vec<f32>)> = stmt
            .query_map([], |r| {
                let id: String = r.get(0)?;
                let blob: Vec<u8> = r.get(1)?;
                Ok((id, row::embedding_from_blob(&blob)))
            })
            .map_err(Error::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(Error::from)?;
        drop(stmt);

        // Over-fetch by 3x to absorb post-hoc scalar filtering.
        let candidates = vector::linear_knn(embedding, &rows, (k * 3).max(k));
        let mut results = Vec::with_capacity(k);
        for candidate in candidates {
            if results.len() >= k {
                break;
            }
            let Some(memory) = conn
                .query_row(SELECT_MEMORY_COLUMNS, params![candidate.id], row::memory_from_row)
                .optional()
                .map_err(Error::from)?
            else {
                continue;
            };
            if matches_filter(&memory, filters) {
                results.push(MemoryResult {
                    memory,
                    distance: candidate.distance,
                });
            }
        }
        Ok(results)
    }

    /// Full-text search ranked by SQLite FTS5's built-in relevance, with
    /// the same filter surface as [`IndexStore::knn`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn text_search(&self, query: &str, k: usize, filters: &SearchFilter) -> Result<Vec<MemoryResult>, Error> {
        let conn = self.conn.acquire();
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn
            .prepare(
                "SELECT m.*, fts.rank AS rank
                 FROM fts
                 JOIN memories m ON m.id = fts.id
                 WHERE fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .map_err(Error::from)?;
        let over_fetch = (k * 3).max(k) as i64;
        let rows: Vec<(Memory, f64)> = stmt
            .query_map(params![sanitized, over_fetch], |r| {
                let memory = row::memory_from_row(r)?;
                let rank: f64 = r.get("rank")?;
                Ok((memory, rank))
            })
            .map_err(Error::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .filter(|(memory, _)| matches_filter(memory, filters))
            .take(k)
            .map(|(memory, rank)| MemoryResult {
                memory,
                // FTS5 rank is negative-is-better; normalize to our
                // ascending "lower is closer" convention.
                distance: rank.abs() as f32,
            })
            .collect())
    }

    /// Applies a sparse patch to an existing memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` has no row, or [`Error::Index`]
    /// on a transaction failure.
    pub fn update(&self, id: &MemoryId, patch: &MemoryPatch) -> Result<(), Error> {
        let conn = self.conn.acquire();
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE memories SET
                    status = COALESCE(?2, status),
                    body = COALESCE(?3, body),
                    tags_json = COALESCE(?4, tags_json),
                    updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    patch.status.map(|s| s.as_str().to_string()),
                    patch.content,
                    patch.tags.as_ref().map(|t| row::tags_to_json(t)),
                    now,
                ],
            )
            .map_err(Error::from)?;
        if changed == 0 {
            return Err(Error::NotFound(id.as_str().to_string()));
        }
        if let Some(body) = &patch.content {
            conn.execute("UPDATE fts SET body = ?2 WHERE id = ?1", params![id.as_str(), body])
                .map_err(Error::from)?;
        }
        Ok(())
    }

    /// Deletes a memory and its derived rows (vectors, fts) via the
    /// `vectors` table's cascading foreign key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a transaction failure.
    pub fn delete(&self, id: &MemoryId) -> Result<(), Error> {
        let conn = self.conn.acquire();
        conn.execute("DELETE FROM fts WHERE id = ?1", params![id.as_str()])
            .map_err(Error::from)?;
        conn.execute("DELETE FROM memories WHERE id = ?1", params![id.as_str()])
            .map_err(Error::from)?;
        Ok(())
    }

    /// Lists the most recently captured memories, optionally restricted to
    /// one namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn list_recent(&self, namespace: Option<Namespace>, limit: usize) -> Result<Vec<Memory>, Error> {
        let conn = self.conn.acquire();
        let sql = format!(
            "SELECT * FROM memories {} ORDER BY timestamp DESC LIMIT ?",
            if namespace.is_some() { "WHERE namespace = ?1" } else { "" }
        );
        let mut stmt = conn.prepare(&sql).map_err(Error::from)?;
        let rows = if let Some(ns) = namespace {
            stmt.query_map(params![ns.as_str(), limit as i64], row::memory_from_row)
        } else {
            stmt.query_map(params![limit as i64], row::memory_from_row)
        }
        .map_err(Error::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Error::from)?;
        Ok(rows)
    }

    /// Aggregate counts and size used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn stats(&self) -> Result<IndexStats, Error> {
        let conn = self.conn.acquire();
        let mut by_namespace = BTreeMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT namespace, COUNT(*) FROM memories GROUP BY namespace")
                .map_err(Error::from)?;
            let rows = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))
                .map_err(Error::from)?;
            for row in rows {
                let (namespace, count) = row.map_err(Error::from)?;
                by_namespace.insert(namespace, count);
            }
        }
        let mut by_spec = BTreeMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT spec, COUNT(*) FROM memories WHERE spec IS NOT NULL GROUP BY spec")
                .map_err(Error::from)?;
            let rows = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))
                .map_err(Error::from)?;
            for row in rows {
                let (spec, count) = row.map_err(Error::from)?;
                by_spec.insert(spec, count);
            }
        }
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .map_err(Error::from)?;
        let last_capture: Option<String> = conn
            .query_row("SELECT MAX(timestamp) FROM memories", [], |r| r.get(0))
            .map_err(Error::from)?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0)).unwrap_or(0);
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0)).unwrap_or(0);

        Ok(IndexStats {
            by_namespace,
            by_spec,
            total: total as usize,
            size_bytes: (page_count * page_size).max(0) as u64,
            last_capture: last_capture.and_then(|s| s.parse().ok()),
        })
    }

    /// Scans for rows in `vectors`/`fts` with no corresponding `memories`
    /// row (spec.md §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn verify(&self) -> Result<IndexVerificationReport, Error> {
        let conn = self.conn.acquire();
        let orphaned_vectors: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vectors WHERE id NOT IN (SELECT id FROM memories)",
                [],
                |r| r.get(0),
            )
            .map_err(Error::from)?;
        let orphaned_fts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fts WHERE id NOT IN (SELECT id FROM memories)",
                [],
                |r| r.get(0),
            )
            .map_err(Error::from)?;
        Ok(IndexVerificationReport {
            orphaned_vectors: orphaned_vectors as usize,
            orphaned_fts: orphaned_fts as usize,
        })
    }

    /// Truncates every derived table. Used by `SyncEngine::full_reindex`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a transaction failure.
    pub fn truncate(&self) -> Result<(), Error> {
        let conn = self.conn.acquire();
        conn.execute_batch(
            "DELETE FROM vectors; DELETE FROM fts; DELETE FROM memories;
             DELETE FROM access_log; DELETE FROM index_dimensions;",
        )
        .map_err(Error::from)?;
        Ok(())
    }

    /// Records `id` as accessed at the current instant. Used by
    /// [`crate::lifecycle::LifecycleEngine::sweep`] so memories under
    /// active recall use don't age out alongside untouched ones (spec.md
    /// §4.8's "no recent access" conjunction).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a transaction failure.
    pub fn touch_accessed(&self, id: &MemoryId) -> Result<(), Error> {
        let conn = self.conn.acquire();
        conn.execute(
            "INSERT INTO access_log (id, last_accessed_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET last_accessed_at = excluded.last_accessed_at",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )
        .map_err(Error::from)?;
        Ok(())
    }

    /// Returns when `id` was last recorded as accessed via
    /// [`IndexStore::touch_accessed`], if ever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn last_accessed(&self, id: &MemoryId) -> Result<Option<chrono::DateTime<Utc>>, Error> {
        let conn = self.conn.acquire();
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_accessed_at FROM access_log WHERE id = ?1",
                params![id.as_str()],
                |r| r.get(0),
            )
            .optional()
            .map_err(Error::from)?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    /// Records the note-blob sha last seen for `(commit_sha, namespace)`,
    /// used by `SyncEngine::incremental` to detect changed notes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a transaction failure.
    pub fn record_note_blob(&self, commit_sha: &str, namespace: Namespace, blob_sha: &str) -> Result<(), Error> {
        let conn = self.conn.acquire();
        conn.execute(
            "INSERT INTO note_blobs (commit_sha, namespace, blob_sha) VALUES (?1, ?2, ?3)
             ON CONFLICT(commit_sha, namespace) DO UPDATE SET blob_sha = excluded.blob_sha",
            params![commit_sha, namespace.as_str(), blob_sha],
        )
        .map_err(Error::from)?;
        Ok(())
    }

    /// Returns the note-blob sha last recorded for `(commit_sha,
    /// namespace)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn last_seen_blob(&self, commit_sha: &str, namespace: Namespace) -> Result<Option<String>, Error> {
        let conn = self.conn.acquire();
        conn.query_row(
            "SELECT blob_sha FROM note_blobs WHERE commit_sha = ?1 AND namespace = ?2",
            params![commit_sha, namespace.as_str()],
            |r| r.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Deletes the recorded blob sha for `(commit_sha, namespace)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a transaction failure.
    pub fn forget_note_blob(&self, commit_sha: &str, namespace: Namespace) -> Result<(), Error> {
        let conn = self.conn.acquire();
        conn.execute(
            "DELETE FROM note_blobs WHERE commit_sha = ?1 AND namespace = ?2",
            params![commit_sha, namespace.as_str()],
        )
        .map_err(Error::from)?;
        Ok(())
    }

    /// Deletes every row under `(namespace, commit_sha)` whose ordinal is
    /// `>= keep_below`, used by `SyncEngine::reindex_note` to drop index
    /// rows whose corresponding note block disappeared (the note shrank,
    /// or was removed entirely with `keep_below == 0`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query or transaction failure.
    pub fn delete_ordinals_at_or_above(&self, namespace: Namespace, commit_sha: &str, keep_below: usize) -> Result<usize, Error> {
        let conn = self.conn.acquire();
        let mut stmt = conn
            .prepare("SELECT id FROM memories WHERE commit_sha = ?1 AND namespace = ?2")
            .map_err(Error::from)?;
        let ids: Vec<String> = stmt
            .query_map(params![commit_sha, namespace.as_str()], |r| r.get(0))
            .map_err(Error::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(Error::from)?;
        drop(stmt);

        let mut removed = 0;
        for id in ids {
            let Some((_, _, ordinal)) = MemoryId::parse(&id) else {
                continue;
            };
            if ordinal < keep_below {
                continue;
            }
            conn.execute("DELETE FROM fts WHERE id = ?1", params![id]).map_err(Error::from)?;
            conn.execute("DELETE FROM memories WHERE id = ?1", params![id]).map_err(Error::from)?;
            removed += 1;
        }
        Ok(removed)
    }
}

const SELECT_MEMORY_COLUMNS: &str = "SELECT * FROM memories WHERE id = ?1";

fn upsert_one(tx: &rusqlite::Transaction<'_>, memory: &Memory, embedding: Option<&[f32]>) -> Result<(), Error> {
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO memories
            (id, commit_sha, namespace, repo_path, summary, body, tags_json, timestamp, spec, phase, status, relates_to_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
         ON CONFLICT(id) DO UPDATE SET
            summary = excluded.summary, body = excluded.body, tags_json = excluded.tags_json,
            spec = excluded.spec, phase = excluded.phase, status = excluded.status,
            relates_to_json = excluded.relates_to_json, updated_at = ?13",
        params![
            memory.id.as_str(),
            memory.commit_sha,
            memory.namespace.as_str(),
            memory.repo_path.to_string_lossy(),
            memory.summary,
            memory.content,
            row::tags_to_json(&memory.tags),
            memory.timestamp.to_rfc3339(),
            memory.spec,
            memory.phase,
            memory.status.as_str(),
            row::relates_to_json(&memory.relates_to),
            now,
        ],
    )
    .map_err(Error::from)?;

    tx.execute(
        "INSERT INTO fts (id, summary, body) VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        params![memory.id.as_str(), memory.summary, memory.content],
    )
    .map_err(Error::from)?;
    tx.execute(
        "UPDATE fts SET summary = ?2, body = ?3 WHERE id = ?1",
        params![memory.id.as_str(), memory.summary, memory.content],
    )
    .map_err(Error::from)?;

    if let Some(embedding) = embedding {
        enforce_index_dimension(tx, embedding.len())?;
        tx.execute(
            "INSERT INTO vectors (id, embedding, dimensions) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding, dimensions = excluded.dimensions",
            params![memory.id.as_str(), row::embedding_to_blob(embedding), embedding.len() as i64],
        )
        .map_err(Error::from)?;
    }

    Ok(())
}

/// Enforces I3 ("vector dimension is fixed per index; mixing dimensions is
/// a hard error") against every vector ever stored, not just the same id's
/// previous one. The first embedding upserted into a fresh index fixes
/// `index_dimensions`; every later embedding must match it exactly.
fn enforce_index_dimension(tx: &rusqlite::Transaction<'_>, dimensions: usize) -> Result<(), Error> {
    let fixed: Option<i64> = tx
        .query_row("SELECT dimensions FROM index_dimensions WHERE id = 1", [], |r| r.get(0))
        .optional()
        .map_err(Error::from)?;
    match fixed {
        Some(fixed) if fixed as usize != dimensions => Err(Error::validation(
            "embedding",
            format!("dimension {dimensions} does not match this index's fixed dimension {fixed}"),
        )),
        Some(_) => Ok(()),
        None => {
            tx.execute(
                "INSERT INTO index_dimensions (id, dimensions) VALUES (1, ?1)",
                params![dimensions as i64],
            )
            .map_err(Error::from)?;
            Ok(())
        }
    }
}

fn matches_filter(memory: &Memory, filters: &SearchFilter) -> bool {
    if let Some(repo_path) = &filters.repo_path {
        if memory.repo_path != *repo_path {
            return false;
        }
    }
    if !filters.namespaces.is_empty() && !filters.namespaces.contains(&memory.namespace) {
        return false;
    }
    if let Some(spec) = &filters.spec {
        if memory.spec.as_deref() != Some(spec.as_str()) {
            return false;
        }
    }
    if !filters.statuses.is_empty() && !filters.statuses.contains(&memory.status) {
        return false;
    }
    if let Some(since) = filters.since {
        if memory.timestamp < since {
            return false;
        }
    }
    if let Some(until) = filters.until {
        if memory.timestamp > until {
            return false;
        }
    }
    if !filters.tags_any.is_empty() && !memory.tags.iter().any(|t| filters.tags_any.contains(t)) {
        return false;
    }
    true
}

/// Strips characters FTS5's query syntax treats specially, so a summary
/// containing e.g. `"` can't break the MATCH expression.
fn sanitize_fts_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(|word| format!("{word}*"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn check_integrity(conn: &rusqlite::Connection) -> Result<(), Error> {
    let result: String = conn
        .query_row("PRAGMA integrity_check", [], |r| r.get(0))
        .map_err(Error::from)?;
    if result != "ok" {
        return Err(Error::index(IndexErrorKind::Corrupt, result));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryId;

    fn sample(ordinal: usize) -> Memory {
        Memory {
            id: MemoryId::new_for(Namespace::Decisions, "abc1234", ordinal),
            commit_sha: "abc1234".to_string(),
            repo_path: "/repo".into(),
            namespace: Namespace::Decisions,
            summary: format!("Decision {ordinal}"),
            content: "body text".to_string(),
            timestamp: Utc::now(),
            spec: Some("storage".to_string()),
            phase: None,
            tags: vec!["db".to_string()],
            status: MemoryStatus::Active,
            relates_to: Vec::new(),
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, Some(&[0.1, 0.2, 0.3])).unwrap();
        let fetched = store.get(&memory.id).unwrap().unwrap();
        assert_eq!(fetched.summary, memory.summary);
    }

    #[test]
    fn upsert_without_embedding_is_still_discoverable() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, None).unwrap();
        assert!(store.get(&memory.id).unwrap().is_some());
    }

    #[test]
    fn knn_returns_closest_first() {
        let store = IndexStore::open_in_memory().unwrap();
        let a = sample(0);
        let mut b = sample(1);
        b.summary = "Decision far".to_string();
        store.upsert(&a, Some(&[1.0, 0.0])).unwrap();
        store.upsert(&b, Some(&[0.0, 1.0])).unwrap();
        let results = store.knn(&[0.9, 0.1], 2, &SearchFilter::default()).unwrap();
        assert_eq!(results[0].memory.id, a.id);
    }

    #[test]
    fn text_search_finds_matching_summary() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, None).unwrap();
        let results = store.text_search("Decision", 10, &SearchFilter::default()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn update_changes_status() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, None).unwrap();
        store
            .update(
                &memory.id,
                &MemoryPatch {
                    status: Some(MemoryStatus::Resolved),
                    ..Default::default()
                },
            )
            .unwrap();
        let fetched = store.get(&memory.id).unwrap().unwrap();
        assert_eq!(fetched.status, MemoryStatus::Resolved);
    }

    #[test]
    fn update_missing_id_returns_not_found() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = MemoryId::new_for(Namespace::Decisions, "deadbee", 0);
        let err = store.update(&id, &MemoryPatch::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn delete_removes_the_row() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, Some(&[0.1, 0.2])).unwrap();
        store.delete(&memory.id).unwrap();
        assert!(store.get(&memory.id).unwrap().is_none());
    }

    #[test]
    fn verify_reports_no_drift_for_consistent_store() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, Some(&[0.1, 0.2])).unwrap();
        let report = store.verify().unwrap();
        assert_eq!(report.orphaned_vectors, 0);
        assert_eq!(report.orphaned_fts, 0);
    }

    #[test]
    fn stats_counts_by_namespace() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&sample(0), None).unwrap();
        store.upsert(&sample(1), None).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_namespace.get("decisions"), Some(&2));
    }

    #[test]
    fn rejects_embedding_dimension_mismatch() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, Some(&[0.1, 0.2, 0.3])).unwrap();
        let err = store.upsert(&memory, Some(&[0.1, 0.2])).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn rejects_dimension_mismatch_across_different_memories() {
        let store = IndexStore::open_in_memory().unwrap();
        let a = sample(0);
        let b = sample(1);
        store.upsert(&a, Some(&[0.1, 0.2, 0.3])).unwrap();
        let err = store.upsert(&b, Some(&[0.1, 0.2])).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn touch_accessed_records_a_timestamp() {
        let store = IndexStore::open_in_memory().unwrap();
        let memory = sample(0);
        store.upsert(&memory, None).unwrap();
        assert!(store.last_accessed(&memory.id).unwrap().is_none());
        store.touch_accessed(&memory.id).unwrap();
        assert!(store.last_accessed(&memory.id).unwrap().is_some());
    }

    #[test]
    fn delete_ordinals_at_or_above_drops_only_the_trailing_rows() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&sample(0), None).unwrap();
        store.upsert(&sample(1), None).unwrap();
        store.upsert(&sample(2), None).unwrap();

        let removed = store.delete_ordinals_at_or_above(Namespace::Decisions, "abc1234", 1).unwrap();
        assert_eq!(removed, 2);
        assert!(store.get(&sample(0).id).unwrap().is_some());
        assert!(store.get(&sample(1).id).unwrap().is_none());
        assert!(store.get(&sample(2).id).unwrap().is_none());
    }
}
