//! Namespace, status, and hydration-level enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of namespaces a memory may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    /// Project/feature inception notes.
    Inception,
    /// Requirements elicitation.
    Elicitation,
    /// Research findings.
    Research,
    /// Architectural and design decisions.
    Decisions,
    /// Work progress and milestones.
    Progress,
    /// Blockers and impediments.
    Blockers,
    /// Review feedback.
    Reviews,
    /// Lessons learned from debugging or issues.
    Learnings,
    /// Retrospective notes.
    Retrospective,
    /// Derived, cross-memory patterns (see [`crate::models::Pattern`]).
    Patterns,
}

impl Namespace {
    /// All ten namespaces, in the order spec.md §3 lists them.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Inception,
            Self::Elicitation,
            Self::Research,
            Self::Decisions,
            Self::Progress,
            Self::Blockers,
            Self::Reviews,
            Self::Learnings,
            Self::Retrospective,
            Self::Patterns,
        ]
    }

    /// Returns the namespace as the string used in git ref paths and note
    /// headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inception => "inception",
            Self::Elicitation => "elicitation",
            Self::Research => "research",
            Self::Decisions => "decisions",
            Self::Progress => "progress",
            Self::Blockers => "blockers",
            Self::Reviews => "reviews",
            Self::Learnings => "learnings",
            Self::Retrospective => "retrospective",
            Self::Patterns => "patterns",
        }
    }

    /// Parses a namespace from its string form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inception" => Some(Self::Inception),
            "elicitation" => Some(Self::Elicitation),
            "research" => Some(Self::Research),
            "decisions" => Some(Self::Decisions),
            "progress" => Some(Self::Progress),
            "blockers" => Some(Self::Blockers),
            "reviews" => Some(Self::Reviews),
            "learnings" => Some(Self::Learnings),
            "retrospective" => Some(Self::Retrospective),
            "patterns" => Some(Self::Patterns),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a memory (spec.md §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// Live and freely discoverable.
    #[default]
    Active,
    /// Resolved (used by `blockers`; superseded-but-kept elsewhere).
    Resolved,
    /// Decayed past the half-life with no recent access.
    Aging,
    /// Compacted and retained for historical reference.
    Archived,
    /// Soft-deleted; body nulled, header retained for dedup until GC.
    Tombstone,
}

impl MemoryStatus {
    /// Returns the status as the string used in note headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Aging => "aging",
            Self::Archived => "archived",
            Self::Tombstone => "tombstone",
        }
    }

    /// Parses a status from its string form (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            "aging" => Some(Self::Aging),
            "archived" => Some(Self::Archived),
            "tombstone" => Some(Self::Tombstone),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How deeply a [`crate::models::Memory`] should be hydrated on recall
/// (spec.md §4.6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetailLevel {
    /// Header/metadata only.
    Summary,
    /// Metadata plus the full markdown body.
    Full,
    /// Metadata, body, and commit-time file snapshots.
    Files,
}
