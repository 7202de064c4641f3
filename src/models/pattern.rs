//! The derived `Pattern` entity produced by [`crate::pattern::PatternEngine`].

use super::MemoryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of cross-memory pattern a [`crate::models::Pattern`] captures
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// A repeated approach that worked.
    Success,
    /// A repeated approach that backfired.
    Anti,
    /// A recurring process/workflow.
    Workflow,
    /// A recurring kind of decision.
    Decision,
}

impl PatternType {
    /// Returns the pattern type as its string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Anti => "anti",
            Self::Workflow => "workflow",
            Self::Decision => "decision",
        }
    }

    /// Parses a pattern type from its string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "anti" => Some(Self::Anti),
            "workflow" => Some(Self::Workflow),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a [`crate::models::Pattern`] (spec.md §3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    /// Freshly clustered, not yet promoted or demoted.
    Candidate,
    /// Confirmed by enough supporting evidence.
    Validated,
    /// Promoted to an actionable, user-facing pattern.
    Promoted,
    /// Contradicted by later evidence.
    Demoted,
}

impl PatternStatus {
    /// Returns the pattern status as its string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Validated => "validated",
            Self::Promoted => "promoted",
            Self::Demoted => "demoted",
        }
    }

    /// Parses a pattern status from its string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "candidate" => Some(Self::Candidate),
            "validated" => Some(Self::Validated),
            "promoted" => Some(Self::Promoted),
            "demoted" => Some(Self::Demoted),
            _ => None,
        }
    }
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A derived memory summarizing a cluster of related memories
/// (spec.md §3, §4.9). Stored as an ordinary [`super::Memory`] in the
/// `patterns` namespace, with these extra fields carried in the note
/// header alongside it.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Id of the backing `patterns`-namespace memory.
    pub memory_id: MemoryId,
    /// What kind of pattern this is.
    pub pattern_type: PatternType,
    /// Confidence in `[0, 1]`, proportional to cluster cohesion and size.
    pub confidence: f32,
    /// Current promotion/demotion status.
    pub status: PatternStatus,
    /// Ids of the memories that make up the cluster this pattern derives
    /// from.
    pub evidence: Vec<MemoryId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_type_round_trips() {
        for t in [
            PatternType::Success,
            PatternType::Anti,
            PatternType::Workflow,
            PatternType::Decision,
        ] {
            assert_eq!(PatternType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn pattern_status_round_trips() {
        for s in [
            PatternStatus::Candidate,
            PatternStatus::Validated,
            PatternStatus::Promoted,
            PatternStatus::Demoted,
        ] {
            assert_eq!(PatternStatus::parse(s.as_str()), Some(s));
        }
    }
}
