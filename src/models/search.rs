//! Filter criteria shared by [`crate::index::IndexStore`] queries and
//! [`crate::recall::RecallEngine`].

use super::{MemoryStatus, Namespace};
use chrono::{DateTime, Utc};

/// Scalar filter applied alongside a KNN or FTS query (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to this repository (absolute canonical path). Almost always
    /// set — the index partitions memories by repo.
    pub repo_path: Option<std::path::PathBuf>,
    /// Restrict to these namespaces (OR'd together). Empty means no
    /// restriction.
    pub namespaces: Vec<Namespace>,
    /// Restrict to this project/topic slug.
    pub spec: Option<String>,
    /// Restrict to these statuses (OR'd together). Empty means no
    /// restriction.
    pub statuses: Vec<MemoryStatus>,
    /// Restrict to memories captured at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to memories captured at or before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Restrict to memories carrying at least one of these tags.
    pub tags_any: Vec<String>,
}

impl SearchFilter {
    /// An empty filter that matches everything within a repo.
    #[must_use]
    pub fn for_repo(repo_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            repo_path: Some(repo_path.into()),
            ..Self::default()
        }
    }

    /// Restricts to a single namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self
    }

    /// Returns true if no row could possibly be excluded by this filter
    /// beyond `repo_path`.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.namespaces.is_empty()
            && self.spec.is_none()
            && self.statuses.is_empty()
            && self.since.is_none()
            && self.until.is_none()
            && self.tags_any.is_empty()
    }
}
