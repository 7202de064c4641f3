//! `CaptureEngine`: orchestrates "at most one concurrent capture per repo,
//! never loses a successfully-appended note, never indexes a note that was
//! not appended" (spec.md §4.5).

mod lock;
pub mod ops;

use crate::codec::{self, NoteMeta};
use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::error::CaptureErrorKind;
use crate::git::GitNoteStore;
use crate::index::{IndexStore, MemoryPatch};
use crate::models::{Memory, MemoryId, MemoryStatus, Namespace};
use crate::Error;
use chrono::Utc;
use lock::CaptureLock;
use std::path::PathBuf;

/// Inputs to [`CaptureEngine::capture`].
#[derive(Debug, Clone)]
pub struct CaptureInput {
    /// Which namespace this memory belongs to.
    pub namespace: Namespace,
    /// Single-line summary.
    pub summary: String,
    /// Markdown body.
    pub body: String,
    /// Optional project/topic slug.
    pub spec: Option<String>,
    /// Optional free-form phase tag.
    pub phase: Option<String>,
    /// Tags to attach.
    pub tags: Vec<String>,
    /// Target commit; defaults to `HEAD` when absent.
    pub commit_sha: Option<String>,
    /// Ids of related memories.
    pub relates_to: Vec<MemoryId>,
    /// Lifecycle status the appended block's header should carry.
    /// Defaults to `active`; callers that append a resolution (see
    /// [`ops::resolve_blocker`]) set this to `resolved` so the new block,
    /// not just the index row, reflects it.
    pub status: MemoryStatus,
}

impl CaptureInput {
    /// Builds a minimal capture input for `namespace`, with `status`
    /// defaulted to `active`.
    #[must_use]
    pub fn new(namespace: Namespace, summary: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            namespace,
            summary: summary.into(),
            body: body.into(),
            spec: None,
            phase: None,
            tags: Vec::new(),
            commit_sha: None,
            relates_to: Vec::new(),
            status: MemoryStatus::Active,
        }
    }
}

/// Outcome of a capture attempt. `success` is true whenever the note was
/// durably appended to git, even if indexing subsequently degraded
/// (spec.md §4.5 step 8: "git is source of truth").
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Whether the note was appended to git.
    pub success: bool,
    /// The new memory's id, present whenever `success` is true.
    pub id: Option<MemoryId>,
    /// Whether the memory is also queryable via `IndexStore` right now.
    pub indexed: bool,
    /// Non-fatal degradation, e.g. `"embedding_failed"` or `"indexed_later"`.
    pub warning: Option<String>,
}

/// Orchestrates capture: lock, resolve commit, encode, append to git,
/// embed, upsert, release (spec.md §4.5).
pub struct CaptureEngine<'a> {
    config: &'a EngineConfig,
    notes: &'a GitNoteStore,
    index: &'a IndexStore,
    embedder: &'a dyn Embedder,
    repo_path: PathBuf,
}

impl<'a> CaptureEngine<'a> {
    /// Builds a capture engine over the given collaborators.
    #[must_use]
    pub fn new(
        config: &'a EngineConfig,
        notes: &'a GitNoteStore,
        index: &'a IndexStore,
        embedder: &'a dyn Embedder,
        repo_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            notes,
            index,
            embedder,
            repo_path: repo_path.into(),
        }
    }

    /// Runs the nine-step capture protocol (spec.md §4.5).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `input` fails [`codec::validate`]
    /// before any side effect; [`Error::Capture`] with
    /// [`CaptureErrorKind::LockTimeout`] if the per-repo lock cannot be
    /// acquired; or [`Error::Storage`] if `GitNoteStore::append` fails
    /// (in which case the index is left untouched).
    #[tracing::instrument(skip(self, input), fields(namespace = %input.namespace))]
    pub fn capture(&self, input: CaptureInput) -> Result<CaptureResult, Error> {
        let timestamp = Utc::now();
        let meta = NoteMeta {
            namespace: input.namespace,
            timestamp,
            summary: input.summary.clone(),
            spec: input.spec.clone(),
            phase: input.phase.clone(),
            tags: input.tags.clone(),
            status: input.status,
            relates_to: input.relates_to.clone(),
        };

        // Step 1: validate; no side effects before this point.
        codec::validate(&meta, &input.body)?;

        // Step 2: acquire the per-repo lock.
        let lock_path = self.config.repo_data_dir(&self.repo_path).join("capture.lock");
        let _lock = CaptureLock::acquire(&lock_path, self.config.capture_lock_timeout)?;

        self.capture_locked(input, meta)
    }

    fn capture_locked(&self, input: CaptureInput, meta: NoteMeta) -> Result<CaptureResult, Error> {
        // Step 3: resolve target commit.
        let commit_sha = match &input.commit_sha {
            Some(sha) => {
                crate::git::sanitize::commit_sha(sha)?;
                sha.clone()
            }
            None => self.resolve_head()?,
        };

        // Step 4: determine next ordinal.
        let existing = self.notes.read(&commit_sha, input.namespace)?;
        let ordinal = existing
            .as_deref()
            .map(|text| codec::decode(text).map(|blocks| blocks.len()).unwrap_or(0))
            .unwrap_or(0);

        // Step 5: encode and append.
        let block_text = codec::encode(&meta, &input.body)?;
        self.notes.append(&commit_sha, &block_text, input.namespace)?;

        // Step 6: build the Memory.
        let id = MemoryId::new_for(input.namespace, &commit_sha, ordinal);
        let memory = Memory {
            id: id.clone(),
            commit_sha: commit_sha.clone(),
            repo_path: self.repo_path.clone(),
            namespace: input.namespace,
            summary: input.summary,
            content: input.body,
            timestamp: meta.timestamp,
            spec: input.spec,
            phase: input.phase,
            tags: input.tags,
            status: input.status,
            relates_to: input.relates_to,
        };

        // Step 7: attempt embedding; degrade on failure.
        let embed_text = format!("{}\n\n{}", memory.summary, memory.content);
        let (embedding, embed_warning) = match self.embedder.embed(&embed_text) {
            Ok(vector) => (Some(vector), None),
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed during capture");
                (None, Some("embedding_failed".to_string()))
            }
        };

        // Step 8: upsert; leave a repair hint on failure rather than
        // failing the whole capture (git is already the source of truth).
        let (indexed, index_warning) = match self.index.upsert(&memory, embedding.as_deref()) {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::warn!(error = %e, "index upsert failed during capture; leaving repair hint");
                self.write_repair_hint(&memory)?;
                (false, Some("indexed_later".to_string()))
            }
        };

        // Step 9: the lock releases via `_lock`'s `Drop` in the caller.
        Ok(CaptureResult {
            success: true,
            id: Some(id),
            indexed,
            warning: index_warning.or(embed_warning),
        })
    }

    fn resolve_head(&self) -> Result<String, Error> {
        let out = crate::git::process::run(
            &self.repo_path,
            &["rev-parse", "HEAD"],
            None,
            self.config.subprocess_timeout,
        )?;
        if out.status != 0 {
            return Err(Error::storage(
                crate::error::StorageErrorKind::NotAGitRepo,
                "HEAD does not resolve to a commit",
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn write_repair_hint(&self, memory: &Memory) -> Result<(), Error> {
        let dir = self.config.repair_hints_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::capture(CaptureErrorKind::Inconsistent, format!("failed to create repair hints dir: {e}"))
        })?;
        let path = dir.join(format!("{}.json", memory.id.as_str().replace([':', '/'], "_")));
        let hint = serde_json::json!({
            "repo_path": memory.repo_path,
            "commit_sha": memory.commit_sha,
            "namespace": memory.namespace.as_str(),
            "id": memory.id.as_str(),
        });
        std::fs::write(&path, hint.to_string()).map_err(|e| {
            Error::capture(CaptureErrorKind::Inconsistent, format!("failed to write repair hint: {e}"))
        })
    }

    /// Applies `status` to an existing memory via the index (used by
    /// [`ops::resolve_blocker`]).
    pub(crate) fn update_status(&self, id: &MemoryId, status: MemoryStatus) -> Result<(), Error> {
        self.index.update(
            id,
            &MemoryPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }
}
