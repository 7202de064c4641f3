//! Commit metadata surfaced by [`crate::git::GitNoteStore::commit_info`].

use chrono::{DateTime, Utc};

/// A commit's identifying metadata (spec.md §3).
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// 40-hex commit sha.
    pub sha: String,
    /// Author name and email, as recorded by git (`Name <email>`).
    pub author: String,
    /// Author timestamp.
    pub author_timestamp: DateTime<Utc>,
    /// First line of the commit message.
    pub subject: String,
    /// Paths changed by this commit relative to its first parent (or, for
    /// a root commit, relative to the empty tree).
    pub changed_paths: Vec<String>,
}
