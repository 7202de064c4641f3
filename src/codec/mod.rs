//! Encodes and parses the note block format (spec.md §4.1, §6).
//!
//! A block is a YAML header delimited by `---` fences followed by a blank
//! line and a markdown body. Multiple blocks are concatenated within one
//! git note, each separated by a single blank line. This module is the one
//! place that touches the text-centric header format directly — every
//! other component consumes typed [`crate::models::Memory`] values (the
//! "isolate text-centric coupling" design note in spec.md §9).

use crate::models::{MemoryId, MemoryStatus, Namespace};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum nesting depth of the YAML header. Protects against pathological
/// nested structures (spec.md §4.1).
const MAX_HEADER_DEPTH: usize = 8;

const FENCE: &str = "---";

/// Typed representation of a note header — the only place the YAML shape
/// is visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoteHeader {
    #[serde(rename = "type")]
    namespace: Namespace,
    timestamp: DateTime<Utc>,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default)]
    status: MemoryStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    relates_to: Vec<String>,
}

/// The subset of [`Memory`] that lives in a note header — everything
/// except `id`, `commit_sha`, and `repo_path`, which are derived from where
/// the block lives rather than serialized into it.
#[derive(Debug, Clone)]
pub struct NoteMeta {
    /// Namespace this block belongs to.
    pub namespace: Namespace,
    /// Capture instant.
    pub timestamp: DateTime<Utc>,
    /// Single-line summary.
    pub summary: String,
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

impl NoteMeta {
    fn into_header(self) -> NoteHeader {
        NoteHeader {
            namespace: self.namespace,
            timestamp: self.timestamp,
            summary: self.summary,
            spec: self.spec,
            phase: self.phase,
            tags: self.tags,
            status: self.status,
            relates_to: self.relates_to.into_iter().map(String::from).collect(),
        }
    }

    fn from_header(header: NoteHeader) -> Result<Self, Error> {
        let relates_to = header
            .relates_to
            .into_iter()
            .map(|s| {
                MemoryId::parse(&s)
                    .map(|(ns, sha, ord)| MemoryId::new_for(ns, sha, ord))
                    .ok_or_else(|| Error::Parse(format!("invalid relates_to id: {s}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            namespace: header.namespace,
            timestamp: header.timestamp,
            summary: header.summary,
            spec: header.spec,
            phase: header.phase,
            tags: header.tags,
            status: header.status,
            relates_to,
        })
    }
}

/// Encodes one block: a `---`-fenced YAML header, a blank line, then the
/// markdown body. Deterministic: empty optional fields are omitted, never
/// emitted empty (spec.md §4.1).
///
/// # Errors
///
/// Returns [`Error::Parse`] if the header cannot be serialized (this should
/// not happen for a well-formed `NoteMeta`).
pub fn encode(meta: &NoteMeta, body: &str) -> Result<String, Error> {
    let header = meta.clone().into_header();
    let yaml = serde_yaml_ng::to_string(&header)
        .map_err(|e| Error::Parse(format!("failed to serialize header: {e}")))?;
    let yaml = yaml.trim_end();
    Ok(format!("{FENCE}\n{yaml}\n{FENCE}\n\n{}", body.trim_end()))
}

/// Decodes every block in `text`, in append order, assigning `ordinal` by
/// block index (spec.md §4.1, P2).
///
/// # Errors
///
/// Returns [`Error::Parse`] on a malformed header fence, a missing required
/// field, non-UTF-8 bytes (callers are expected to have already decoded to
/// `&str`; this only guards against a header whose YAML can't be parsed),
/// or header nesting beyond [`MAX_HEADER_DEPTH`].
pub fn decode(text: &str) -> Result<Vec<(NoteMeta, String)>, Error> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while !rest.trim().is_empty() {
        let rest_trimmed = rest.trim_start_matches('\n');
        let Some(after_open) = rest_trimmed.strip_prefix(FENCE) else {
            return Err(Error::Parse(
                "expected '---' fence at start of block".to_string(),
            ));
        };
        let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);

        let Some(close_idx) = find_closing_fence(after_open) else {
            return Err(Error::Parse("unterminated header fence".to_string()));
        };
        let header_yaml = &after_open[..close_idx];
        check_depth(header_yaml)?;

        let header: NoteHeader = serde_yaml_ng::from_str(header_yaml)
            .map_err(|e| Error::Parse(format!("malformed header: {e}")))?;
        let meta = NoteMeta::from_header(header)?;

        let after_close = &after_open[close_idx + FENCE.len()..];
        let after_close = after_close.strip_prefix('\n').unwrap_or(after_close);

        // Body runs until the next block's opening fence (on its own line)
        // or end of text. Blocks are separated by a single blank line plus
        // fence, so we look for "\n---\n" / "\n---$" as the next boundary.
        let (body, remainder) = split_at_next_fence(after_close);

        blocks.push((meta, body.trim_end().to_string()));
        rest = remainder;
    }

    Ok(blocks)
}

fn find_closing_fence(s: &str) -> Option<usize> {
    // The header YAML never legitimately contains a line that is just
    // "---", since that's reserved for our fences.
    let mut idx = 0;
    for line in s.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if trimmed == FENCE {
            return Some(idx);
        }
        idx += line.len();
    }
    None
}

fn split_at_next_fence(s: &str) -> (&str, &str) {
    let mut idx = 0;
    let bytes = s.as_bytes();
    while idx < bytes.len() {
        if s[idx..].starts_with(FENCE) {
            let before = &s[idx..];
            let is_line_start = idx == 0 || bytes[idx - 1] == b'\n';
            let fence_end = idx + FENCE.len();
            let is_line_end = fence_end >= bytes.len() || bytes[fence_end] == b'\n';
            if is_line_start && is_line_end && before.starts_with(FENCE) {
                // Trim the blank-line separator preceding this fence.
                let body_end = s[..idx].trim_end_matches('\n').len();
                return (&s[..body_end], &s[idx..]);
            }
        }
        idx += 1;
    }
    (s, "")
}

fn check_depth(yaml: &str) -> Result<(), Error> {
    let max_indent = yaml
        .lines()
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .max()
        .unwrap_or(0);
    // Two spaces per YAML nesting level is the serializer's convention.
    if max_indent / 2 > MAX_HEADER_DEPTH {
        return Err(Error::Parse("header nesting exceeds limit".to_string()));
    }
    Ok(())
}

/// Validates a [`NoteMeta`]/body pair against the size and field rules in
/// spec.md §4.1, I4.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the offending field.
pub fn validate(meta: &NoteMeta, body: &str) -> Result<(), Error> {
    if meta.summary.is_empty() {
        return Err(Error::validation("summary", "must not be empty"));
    }
    if meta.summary.chars().count() > 100 {
        return Err(Error::validation("summary", "exceeds 100 characters"));
    }
    if meta.summary.contains('\n') {
        return Err(Error::validation("summary", "must be single-line"));
    }
    if body.len() > 100 * 1024 {
        return Err(Error::validation("content", "exceeds 100 KiB"));
    }
    if let Some(spec) = &meta.spec {
        if spec.is_empty() || !spec.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::validation("spec", "must be a non-empty printable slug"));
        }
    }
    Ok(())
}

/// Joins already-encoded blocks with the single-blank-line separator notes
/// use between blocks (spec.md §4.1, §6).
#[must_use]
pub fn join_blocks(blocks: &[String]) -> String {
    blocks.join("\n\n")
}
