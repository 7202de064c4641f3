//! Git plumbing: subprocess execution, input sanitization, and the note
//! store itself (spec.md §4.2).

pub mod notes;
pub mod process;
pub mod sanitize;

pub use notes::{resolve_repo_root, GitNoteStore};
