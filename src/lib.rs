//! # gitmemory
//!
//! A git-native, semantically-searchable memory store for developer
//! assistants.
//!
//! Every memory is a small YAML-fenced note appended to `git notes`,
//! namespaced under a configurable ref prefix. Git is the durable,
//! authoritative store; a local SQLite index (scalar columns + a brute-force
//! or `usearch`-backed vector table + FTS5) is a derived cache that can
//! always be rebuilt from git via [`sync::SyncEngine::full_reindex`].
//!
//! ## Components
//!
//! - [`codec`] — encodes/decodes the YAML-fenced note block format.
//! - [`git`] — subprocess-based git note storage (`GitNoteStore`).
//! - [`embedding`] — pluggable text embedders.
//! - [`index`] — the SQLite-backed derived index (`IndexStore`).
//! - [`capture`] — appends new memories (`CaptureEngine`).
//! - [`recall`] — semantic + lexical search and hydration (`RecallEngine`).
//! - [`sync`] — reconciles the index against git (`SyncEngine`).
//! - [`lifecycle`] — decay, archival, and garbage collection (`LifecycleEngine`).
//! - [`pattern`] — cross-memory pattern detection (`PatternEngine`).
//! - [`observability`] — ambient logging/metrics setup.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gitmemory::{CaptureEngine, CaptureInput, Namespace};
//!
//! let result = capture_engine.capture(CaptureInput::new(
//!     Namespace::Decisions,
//!     "Use SQLite for the derived index",
//!     "git notes remain the source of truth; SQLite is rebuildable.",
//! ))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Cannot be moved to function level. Current duplicates: fastembed→ort transitive deps.
#![allow(clippy::multiple_crate_versions)]

pub mod capture;
pub mod codec;
pub mod config;
pub mod embedding;
pub mod error;
pub mod git;
pub mod index;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod pattern;
pub mod recall;
pub mod sync;

pub use capture::{CaptureEngine, CaptureInput, CaptureResult};
pub use codec::NoteMeta;
pub use config::EngineConfig;
pub use embedding::{Embedder, FallbackEmbedder};
pub use error::{Error, Result};
pub use git::{resolve_repo_root, GitNoteStore};
pub use index::{IndexStats, IndexStore, IndexVerificationReport, MemoryPatch};
pub use lifecycle::{GcReport, LifecycleEngine, SweepReport};
pub use models::{
    CommitInfo, DetailLevel, HydratedMemory, Memory, MemoryId, MemoryResult, MemoryStatus,
    Namespace, Pattern, PatternStatus, PatternType, SearchFilter,
};
pub use pattern::PatternEngine;
pub use recall::{NamespaceContext, RecallEngine, RerankWeights};
pub use sync::{ConsistencyReport, NamespaceDiff, SyncEngine};

/// Returns the current Unix timestamp in seconds.
///
/// Centralizes a pattern used for log timestamps and cache-entry ages so it
/// isn't duplicated across modules. Falls back to 0 if the system clock is
/// set before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
