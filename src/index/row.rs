//! Maps between [`Memory`] and the `memories`/`vectors`/`fts` row shapes.

use crate::error::IndexErrorKind;
use crate::models::{Memory, MemoryId, MemoryStatus, Namespace};
use crate::Error;
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Flattened row fields written in a single `upsert` transaction.
pub struct MemoryRow {
    /// The memory, as given by the caller.
    pub memory: Memory,
    /// Embedding vector, if present (spec.md §4.4: absent is allowed).
    pub embedding: Option<Vec<f32>>,
}

pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn tags_from_json(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

pub fn relates_to_json(relates_to: &[MemoryId]) -> String {
    let strings: Vec<&str> = relates_to.iter().map(MemoryId::as_str).collect();
    serde_json::to_string(&strings).unwrap_or_else(|_| "[]".to_string())
}

pub fn relates_to_from_json(json: &str) -> Vec<MemoryId> {
    let strings: Vec<String> = serde_json::from_str(json).unwrap_or_default();
    strings
        .into_iter()
        .filter_map(|s| MemoryId::parse(&s).map(|(ns, sha, ord)| MemoryId::new_for(ns, sha, ord)))
        .collect()
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn embedding_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Builds a [`Memory`] from a `memories` row. Expects columns in the order
/// selected by every query in [`super::IndexStore`].
pub fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let id_str: String = row.get("id")?;
    let commit_sha: String = row.get("commit_sha")?;
    let namespace_str: String = row.get("namespace")?;
    let repo_path: String = row.get("repo_path")?;
    let summary: String = row.get("summary")?;
    let body: String = row.get("body")?;
    let tags_json: String = row.get("tags_json")?;
    let timestamp: String = row.get("timestamp")?;
    let spec: Option<String> = row.get("spec")?;
    let phase: Option<String> = row.get("phase")?;
    let status_str: String = row.get("status")?;
    let relates_to_json: String = row.get("relates_to_json")?;

    let namespace = Namespace::parse(&namespace_str).unwrap_or(Namespace::Decisions);
    let status = MemoryStatus::parse(&status_str).unwrap_or_default();
    let timestamp: DateTime<Utc> = timestamp.parse().unwrap_or_else(|_| Utc::now());

    Ok(Memory {
        id: MemoryId::new_for(namespace, &commit_sha, id_ordinal(&id_str)),
        commit_sha,
        repo_path: repo_path.into(),
        namespace,
        summary,
        content: body,
        timestamp,
        spec,
        phase,
        tags: tags_from_json(&tags_json),
        status,
        relates_to: relates_to_from_json(&relates_to_json),
    })
}

fn id_ordinal(id_str: &str) -> usize {
    MemoryId::parse(id_str).map_or(0, |(_, _, ordinal)| ordinal)
}

/// Converts a `rusqlite::Error` from a row-mapping closure into the
/// crate's error type, used where `query_map` propagates its own error
/// channel rather than `?` alone.
pub fn map_row_error(e: rusqlite::Error) -> Error {
    Error::index(IndexErrorKind::Txn, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_round_trips() {
        let original = vec![0.1f32, -0.2, 3.5, 0.0];
        let blob = embedding_to_blob(&original);
        let restored = embedding_from_blob(&blob);
        assert_eq!(original, restored);
    }

    #[test]
    fn tags_json_round_trips() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let json = tags_to_json(&tags);
        assert_eq!(tags_from_json(&json), tags);
    }
}
