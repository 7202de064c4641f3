//! Crate-wide error type.
//!
//! Every engine surfaces failures through [`Error`]. Each variant carries
//! enough structure for a caller to decide whether to retry, surface the
//! failure to a human, or treat it as a soft degradation (see the
//! `CaptureEngine`/`RecallEngine` docs for where that distinction is made).

use thiserror::Error as ThisError;

/// Sub-kind of a [`Error::Storage`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// A subprocess invocation exceeded its wall-clock budget.
    Timeout,
    /// The target path is not inside a git repository (or has none yet).
    NotAGitRepo,
    /// A ref, sha, or path argument failed sanitization.
    RefInvalid,
    /// The `git` subprocess exited non-zero for a reason other than the above.
    Exec,
}

impl StorageErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NotAGitRepo => "not_a_git_repo",
            Self::RefInvalid => "ref_invalid",
            Self::Exec => "exec",
        }
    }
}

/// Sub-kind of a [`Error::Index`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    /// Schema creation failed.
    Schema,
    /// A forward migration failed partway through.
    Migration,
    /// The on-disk file failed a consistency check on open.
    Corrupt,
    /// A uniqueness or foreign-key constraint was violated.
    Constraint,
    /// A transaction failed to commit.
    Txn,
}

impl IndexErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Migration => "migration",
            Self::Corrupt => "corrupt",
            Self::Constraint => "constraint",
            Self::Txn => "txn",
        }
    }
}

/// Sub-kind of a [`Error::Embedding`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorKind {
    /// The model failed to load (missing artifact, corrupt cache, ...).
    Load,
    /// The embedding backend ran out of memory.
    Oom,
    /// The downstream inference library returned an error.
    Inference,
}

impl EmbeddingErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Oom => "oom",
            Self::Inference => "inference",
        }
    }
}

/// Sub-kind of a [`Error::Capture`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// The per-repo advisory lock could not be acquired before the deadline.
    LockTimeout,
    /// Git and the index disagree in a way capture itself cannot repair.
    Inconsistent,
}

impl CaptureErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::LockTimeout => "lock_timeout",
            Self::Inconsistent => "inconsistent",
        }
    }
}

/// Crate-wide error type.
///
/// Every variant maps to one of the taxonomy kinds in the design: callers
/// that need the `(kind, message, recovery_action)` triple described there
/// can get it from [`Error::kind`], [`std::fmt::Display`], and
/// [`Error::recovery_action`] respectively.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A caller-correctable input failed validation. No side effects occur
    /// before this is returned.
    #[error("validation failed for field '{field}': {reason}")]
    Validation {
        /// The offending field (e.g. `"summary"`, `"namespace"`).
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A git/subprocess/IO failure.
    #[error("storage error ({kind}): {message}")]
    Storage {
        /// Which kind of storage failure this is.
        kind: StorageErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// An `IndexStore` failure.
    #[error("index error ({kind}): {message}")]
    Index {
        /// Which kind of index failure this is.
        kind: IndexErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// An `Embedder` failure.
    #[error("embedding error ({kind}): {message}")]
    Embedding {
        /// Which kind of embedding failure this is.
        kind: EmbeddingErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// A malformed note or header.
    #[error("parse error: {0}")]
    Parse(String),

    /// A `CaptureEngine` orchestration failure.
    #[error("capture error ({kind}): {message}")]
    Capture {
        /// Which kind of capture failure this is.
        kind: CaptureErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// The requested entity does not exist. Non-fatal: callers at the API
    /// surface generally see this as `None`/`Option::None` rather than an
    /// error, but it is a distinct variant for contexts where absence is
    /// itself the failure (e.g. `resolve_blocker` on an unknown id).
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable kind string, for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Storage { kind, .. } => kind.as_str(),
            Self::Index { kind, .. } => kind.as_str(),
            Self::Embedding { kind, .. } => kind.as_str(),
            Self::Parse(_) => "parse",
            Self::Capture { kind, .. } => kind.as_str(),
            Self::NotFound(_) => "not_found",
        }
    }

    /// A short, user-facing suggestion for how to recover.
    #[must_use]
    pub fn recovery_action(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "fix the offending field and retry",
            Self::Storage {
                kind: StorageErrorKind::Timeout,
                ..
            } => "retry; if this persists, check for a hung git process",
            Self::Storage {
                kind: StorageErrorKind::NotAGitRepo,
                ..
            } => "run inside a git repository with at least one commit",
            Self::Storage {
                kind: StorageErrorKind::RefInvalid,
                ..
            } => "check the commit sha, namespace, or path for disallowed characters",
            Self::Storage { .. } => "inspect the underlying git error and retry",
            Self::Index {
                kind: IndexErrorKind::Corrupt,
                ..
            } => "run SyncEngine::full_reindex to rebuild the index from git",
            Self::Index {
                kind: IndexErrorKind::Migration,
                ..
            } => "the index was left at its prior version; safe to retry",
            Self::Index { .. } => "retry the operation; if persistent, rebuild the index",
            Self::Embedding { .. } => "capture will continue without a vector; sync can backfill it later",
            Self::Parse(_) => "the note block is malformed; inspect it with `git notes show`",
            Self::Capture {
                kind: CaptureErrorKind::LockTimeout,
                ..
            } => "retry after the holder of the lock finishes, or raise capture_lock_timeout_ms",
            Self::Capture { .. } => "run SyncEngine::verify_and_repair",
            Self::NotFound(_) => "verify the id and retry",
        }
    }

    /// Builds a [`Error::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Builds a [`Error::Storage`].
    #[must_use]
    pub fn storage(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self::Storage {
            kind,
            message: message.into(),
        }
    }

    /// Builds a [`Error::Index`].
    #[must_use]
    pub fn index(kind: IndexErrorKind, message: impl Into<String>) -> Self {
        Self::Index {
            kind,
            message: message.into(),
        }
    }

    /// Builds a [`Error::Embedding`].
    #[must_use]
    pub fn embedding(kind: EmbeddingErrorKind, message: impl Into<String>) -> Self {
        Self::Embedding {
            kind,
            message: message.into(),
        }
    }

    /// Builds a [`Error::Capture`].
    #[must_use]
    pub fn capture(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self::Capture {
            kind,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::index(IndexErrorKind::Txn, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::storage(StorageErrorKind::Timeout, "git notes list timed out");
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn validation_error_names_field() {
        let err = Error::validation("summary", "too long");
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn every_kind_has_a_recovery_action() {
        let errs = [
            Error::validation("x", "y"),
            Error::storage(StorageErrorKind::Timeout, "t"),
            Error::index(IndexErrorKind::Corrupt, "c"),
            Error::embedding(EmbeddingErrorKind::Load, "l"),
            Error::Parse("bad".to_string()),
            Error::capture(CaptureErrorKind::LockTimeout, "l"),
            Error::NotFound("id".to_string()),
        ];
        for err in errs {
            assert!(!err.recovery_action().is_empty());
        }
    }
}
