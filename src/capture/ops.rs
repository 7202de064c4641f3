//! Namespaced convenience operations (spec.md §4.5): thin wrappers that
//! compose a structured body and set namespace/status accordingly.

use super::{CaptureEngine, CaptureInput, CaptureResult};
use crate::error::CaptureErrorKind;
use crate::models::{MemoryId, MemoryStatus, Namespace};
use crate::Error;

fn structured_body(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .filter(|(_, body)| !body.is_empty())
        .map(|(heading, body)| format!("## {heading}\n{body}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl CaptureEngine<'_> {
    /// Captures an architectural/design decision with Context/Rationale/
    /// Impact sections.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_decision(
        &self,
        summary: impl Into<String>,
        context: &str,
        rationale: &str,
        impact: &str,
    ) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context), ("Rationale", rationale), ("Impact", impact)]);
        self.capture(CaptureInput::new(Namespace::Decisions, summary, body))
    }

    /// Captures a blocker (status `active`).
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_blocker(&self, summary: impl Into<String>, context: &str, impact: &str) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context), ("Impact", impact)]);
        self.capture(CaptureInput::new(Namespace::Blockers, summary, body))
    }

    /// Resolves a previously-captured blocker: appends a resolution body
    /// under `blockers` and transitions the referenced memory to
    /// `resolved` in the index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] with [`CaptureErrorKind::Inconsistent`]
    /// if `blocker_id` is not in the `blockers` namespace. See also
    /// [`CaptureEngine::capture`].
    pub fn resolve_blocker(&self, blocker_id: &MemoryId, resolution: &str) -> Result<CaptureResult, Error> {
        let Some((namespace, _, _)) = MemoryId::parse(blocker_id.as_str()) else {
            return Err(Error::capture(CaptureErrorKind::Inconsistent, "malformed blocker id"));
        };
        if namespace != Namespace::Blockers {
            return Err(Error::capture(
                CaptureErrorKind::Inconsistent,
                "resolve_blocker requires a blockers-namespace id",
            ));
        }

        let body = structured_body(&[("Resolution", resolution)]);
        let mut input = CaptureInput::new(Namespace::Blockers, "Blocker resolved", body);
        input.status = MemoryStatus::Resolved;
        let result = self.capture(input)?;
        self.update_status(blocker_id, MemoryStatus::Resolved)?;
        Ok(result)
    }

    /// Captures a debugging/issue lesson learned.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_learning(&self, summary: impl Into<String>, context: &str, rationale: &str) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context), ("Rationale", rationale)]);
        self.capture(CaptureInput::new(Namespace::Learnings, summary, body))
    }

    /// Captures a work progress/milestone note.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_progress(&self, summary: impl Into<String>, context: &str) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context)]);
        self.capture(CaptureInput::new(Namespace::Progress, summary, body))
    }

    /// Captures a retrospective note.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_retrospective(&self, summary: impl Into<String>, context: &str, impact: &str) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context), ("Impact", impact)]);
        self.capture(CaptureInput::new(Namespace::Retrospective, summary, body))
    }

    /// Captures a derived, cross-memory pattern.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_pattern(&self, summary: impl Into<String>, rationale: &str, evidence: Vec<MemoryId>) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Rationale", rationale)]);
        let mut input = CaptureInput::new(Namespace::Patterns, summary, body);
        input.relates_to = evidence;
        self.capture(input)
    }

    /// Captures review feedback.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub fn capture_review(&self, summary: impl Into<String>, context: &str, rationale: &str) -> Result<CaptureResult, Error> {
        let body = structured_body(&[("Context", context), ("Rationale", rationale)]);
        self.capture(CaptureInput::new(Namespace::Reviews, summary, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_omits_empty_sections() {
        let body = structured_body(&[("Context", "something"), ("Rationale", "")]);
        assert!(body.contains("## Context"));
        assert!(!body.contains("## Rationale"));
    }
}
