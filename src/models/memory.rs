//! The core `Memory` entity and its close relatives.

use super::namespace::MemoryStatus;
use super::Namespace;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of the form `{namespace}:{commit_sha}:{ordinal}`
/// (spec.md §3, §6). Only constructible through [`MemoryId::new_for`] or
/// parsed back from that exact format, so callers can't hand-assemble an id
/// that disagrees with how [`crate::sync::SyncEngine`] reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryId(String);

impl MemoryId {
    /// Builds the canonical id for a memory captured into `namespace` on
    /// `commit_sha` at position `ordinal`.
    #[must_use]
    pub fn new_for(namespace: Namespace, commit_sha: &str, ordinal: usize) -> Self {
        Self(format!("{namespace}:{commit_sha}:{ordinal}"))
    }

    /// Parses a previously-formatted id back into its components.
    #[must_use]
    pub fn parse(s: &str) -> Option<(Namespace, &str, usize)> {
        let mut parts = s.splitn(3, ':');
        let ns = Namespace::parse(parts.next()?)?;
        let sha = parts.next()?;
        let ordinal: usize = parts.next()?.parse().ok()?;
        Some((ns, sha, ordinal))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<MemoryId> for String {
    fn from(id: MemoryId) -> Self {
        id.0
    }
}

/// Dedups `items` while preserving first-seen order.
#[must_use]
pub fn ordered_dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

/// A captured memory entry (spec.md §3).
#[derive(Debug, Clone)]
pub struct Memory {
    /// Stable identifier.
    pub id: MemoryId,
    /// 40-hex commit sha the note is attached to.
    pub commit_sha: String,
    /// Absolute canonical path of the owning repository.
    pub repo_path: std::path::PathBuf,
    /// Which of the ten closed namespaces this memory belongs to.
    pub namespace: Namespace,
    /// Single-line summary, `<= 100` chars.
    pub summary: String,
    /// Markdown body, `<= 100 KiB` UTF-8.
    pub content: String,
    /// UTC instant of capture.
    pub timestamp: DateTime<Utc>,
    /// Optional project/topic slug.
    pub spec: Option<String>,
    /// Optional free-form phase tag.
    pub phase: Option<String>,
    /// Ordered, deduplicated tags.
    pub tags: Vec<String>,
    /// Lifecycle status.
    pub status: MemoryStatus,
    /// Ids of related memories.
    pub relates_to: Vec<MemoryId>,
}

/// A [`Memory`] paired with its distance from a search query
/// (spec.md §3: "lower = closer").
#[derive(Debug, Clone)]
pub struct MemoryResult {
    /// The matched memory.
    pub memory: Memory,
    /// Non-negative distance; lower means closer to the query.
    pub distance: f32,
}

/// A [`Memory`] hydrated to some [`super::DetailLevel`]
/// (spec.md §4.6, GLOSSARY).
#[derive(Debug, Clone)]
pub struct HydratedMemory {
    /// The memory's metadata.
    pub memory: Memory,
    /// The full markdown body, loaded from git at `Full`/`Files` level.
    /// `None` at `Summary` level.
    pub full_body: Option<String>,
    /// Commit-time file snapshots, loaded only at `Files` level. Keys are
    /// paths relative to the repository root.
    pub files: Option<BTreeMap<String, Vec<u8>>>,
    /// Non-fatal problems encountered while hydrating (e.g. a missing git
    /// object) — hydration degrades to the best level available rather
    /// than aborting (spec.md §7).
    pub warnings: Vec<String>,
}

impl HydratedMemory {
    /// Builds a summary-only hydration (no body, no files).
    #[must_use]
    pub fn summary_only(memory: Memory) -> Self {
        Self {
            memory,
            full_body: None,
            files: None,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_id_round_trips() {
        let id = MemoryId::new_for(Namespace::Decisions, "abc1234", 2);
        assert_eq!(id.as_str(), "decisions:abc1234:2");
        assert_eq!(
            MemoryId::parse(id.as_str()),
            Some((Namespace::Decisions, "abc1234", 2))
        );
    }

    #[test]
    fn memory_id_parse_rejects_malformed() {
        assert_eq!(MemoryId::parse("decisions:abc1234"), None);
        assert_eq!(MemoryId::parse("bogus:abc1234:0"), None);
        assert_eq!(MemoryId::parse("decisions:abc1234:notanumber"), None);
    }

    #[test]
    fn ordered_dedup_preserves_first_seen_order() {
        let input = vec!["a", "b", "a", "c", "b"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            ordered_dedup(input),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
