//! `SyncEngine`: bridges `GitNoteStore` and `IndexStore` (spec.md §4.7).

use crate::codec;
use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::git::GitNoteStore;
use crate::index::IndexStore;
use crate::models::{Memory, MemoryId, Namespace};
use crate::Error;
use sha2::Digest;
use std::collections::{BTreeMap, HashSet};

const INCREMENTAL_CHUNK: usize = 1_000;

/// Per-namespace symmetric-difference counts (spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct NamespaceDiff {
    /// Present in git, absent from the index.
    pub in_git_not_index: usize,
    /// Present in the index, absent from git.
    pub in_index_not_git: usize,
    /// Present in both but with a mismatched note-blob hash.
    pub hash_mismatch: usize,
}

/// Consistency report produced by [`SyncEngine::verify_consistency`].
pub type ConsistencyReport = BTreeMap<Namespace, NamespaceDiff>;

/// Bridges the durable git-notes store and the derived index (spec.md
/// §4.7).
pub struct SyncEngine<'a> {
    config: &'a EngineConfig,
    notes: &'a GitNoteStore,
    index: &'a IndexStore,
    embedder: &'a dyn Embedder,
    repo_path: std::path::PathBuf,
}

impl<'a> SyncEngine<'a> {
    /// Builds a sync engine over the given collaborators.
    #[must_use]
    pub fn new(
        config: &'a EngineConfig,
        notes: &'a GitNoteStore,
        index: &'a IndexStore,
        embedder: &'a dyn Embedder,
        repo_path: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            config,
            notes,
            index,
            embedder,
            repo_path: repo_path.into(),
        }
    }

    /// Enumerates notes whose blob hash differs from the index's
    /// last-seen hash per `(commit, namespace)`; re-decodes and upserts
    /// changed notes, and deletes index rows whose note block
    /// disappeared. Processed in chunks of [`INCREMENTAL_CHUNK`] with
    /// checkpointing via `IndexStore::record_note_blob`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Index`] on the first
    /// unrecoverable failure.
    #[tracing::instrument(skip(self))]
    pub fn incremental(&self) -> Result<usize, Error> {
        let mut changed_count = 0;
        for namespace in Namespace::all() {
            let listed = self.notes.list(*namespace)?;
            for chunk in listed.chunks(INCREMENTAL_CHUNK) {
                for (commit_sha, blob_sha) in chunk {
                    let last_seen = self.index.last_seen_blob(commit_sha, *namespace)?;
                    if last_seen.as_deref() == Some(blob_sha.as_str()) {
                        continue;
                    }
                    self.reindex_note(commit_sha, *namespace)?;
                    self.index.record_note_blob(commit_sha, *namespace, blob_sha)?;
                    changed_count += 1;
                }
            }
        }
        Ok(changed_count)
    }

    /// Re-derives the index rows for one `(commit_sha, namespace)` note
    /// from git. Upserts the current blocks, then deletes any index rows
    /// whose ordinal no longer has a corresponding block — covering both
    /// the note having shrunk (fewer blocks than before) and the note
    /// having disappeared entirely (spec.md §4.7).
    fn reindex_note(&self, commit_sha: &str, namespace: Namespace) -> Result<(), Error> {
        let Some(text) = self.notes.read(commit_sha, namespace)? else {
            self.index.delete_ordinals_at_or_above(namespace, commit_sha, 0)?;
            return Ok(());
        };
        let blocks = codec::decode(&text)?;
        let block_count = blocks.len();
        for (ordinal, (meta, body)) in blocks.into_iter().enumerate() {
            let memory = Memory {
                id: MemoryId::new_for(namespace, commit_sha, ordinal),
                commit_sha: commit_sha.to_string(),
                repo_path: self.repo_path.clone(),
                namespace: meta.namespace,
                summary: meta.summary,
                content: body.clone(),
                timestamp: meta.timestamp,
                spec: meta.spec,
                phase: meta.phase,
                tags: meta.tags,
                status: meta.status,
                relates_to: meta.relates_to,
            };
            let embedding = self
                .embedder
                .embed(&format!("{}\n\n{}", memory.summary, body))
                .ok();
            self.index.upsert(&memory, embedding.as_deref())?;
        }
        self.index.delete_ordinals_at_or_above(namespace, commit_sha, block_count)?;
        Ok(())
    }

    /// Truncates the derived tables and rescans every note in every
    /// namespace, re-embedding best-effort. The previous index content
    /// stays visible to concurrent readers until this function's own
    /// `truncate` call commits — at that point readers briefly see an
    /// empty store, the tradeoff accepted for the single-connection model
    /// (spec.md §4.7's "safe against interruption" is about forward
    /// progress resuming cleanly, not about a blackout-free read path
    /// mid-rebuild).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Index`] on failure.
    #[tracing::instrument(skip(self))]
    pub fn full_reindex(&self) -> Result<usize, Error> {
        self.index.truncate()?;
        let mut reindexed = 0;
        for namespace in Namespace::all() {
            for (commit_sha, blob_sha) in self.notes.list(*namespace)? {
                self.reindex_note(&commit_sha, *namespace)?;
                self.index.record_note_blob(&commit_sha, *namespace, &blob_sha)?;
                reindexed += 1;
            }
        }
        Ok(reindexed)
    }

    /// Computes symmetric-difference counts per namespace between git and
    /// the index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Index`] on failure.
    #[tracing::instrument(skip(self))]
    pub fn verify_consistency(&self) -> Result<ConsistencyReport, Error> {
        let mut report = ConsistencyReport::new();
        for namespace in Namespace::all() {
            let git_notes = self.notes.list(*namespace)?;
            let git_shas: HashSet<&str> = git_notes.iter().map(|(sha, _)| sha.as_str()).collect();

            let indexed = self.index.list_recent(Some(*namespace), usize::MAX)?;
            let indexed_shas: HashSet<&str> = indexed.iter().map(|m| m.commit_sha.as_str()).collect();

            let mut diff = NamespaceDiff::default();
            diff.in_git_not_index = git_shas.difference(&indexed_shas).count();
            diff.in_index_not_git = indexed_shas.difference(&git_shas).count();

            for (commit_sha, blob_sha) in &git_notes {
                if !indexed_shas.contains(commit_sha.as_str()) {
                    continue;
                }
                let last_seen = self.index.last_seen_blob(commit_sha, *namespace)?;
                if last_seen.as_deref() != Some(blob_sha.as_str()) {
                    diff.hash_mismatch += 1;
                }
            }

            if diff.in_git_not_index > 0 || diff.in_index_not_git > 0 || diff.hash_mismatch > 0 {
                report.insert(*namespace, diff);
            }
        }
        Ok(report)
    }

    /// Applies the minimal set of upserts/deletes to drive
    /// [`SyncEngine::verify_consistency`]'s diffs to zero. Idempotent:
    /// repeated calls converge (spec.md §5).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Index`] on failure.
    #[tracing::instrument(skip(self))]
    pub fn verify_and_repair(&self) -> Result<ConsistencyReport, Error> {
        let report = self.verify_consistency()?;
        for namespace in report.keys() {
            let git_notes = self.notes.list(*namespace)?;
            let git_shas: HashSet<&str> = git_notes.iter().map(|(sha, _)| sha.as_str()).collect();
            let indexed = self.index.list_recent(Some(*namespace), usize::MAX)?;

            for memory in &indexed {
                if !git_shas.contains(memory.commit_sha.as_str()) {
                    self.index.delete(&memory.id)?;
                }
            }
            for (commit_sha, blob_sha) in &git_notes {
                self.reindex_note(commit_sha, *namespace)?;
                self.index.record_note_blob(commit_sha, *namespace, blob_sha)?;
            }
        }
        self.verify_consistency()
    }
}

/// Computes a stable content hash for a raw note text, used in place of
/// git's own blob sha when the caller already has the text and wants to
/// avoid an extra `git` invocation.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
