//! `LifecycleEngine`: decay-driven status transitions, archival
//! compaction, and garbage collection (spec.md §4.8). Grounded in style on
//! the teacher's `services/tombstone.rs` — a complete, `tracing`/`metrics`
//! instrumented service operating through the store rather than through
//! git directly.

use crate::config::EngineConfig;
use crate::index::{IndexStore, MemoryPatch};
use crate::models::{MemoryStatus, Namespace};
use crate::Error;
use chrono::Utc;

/// Outcome of [`LifecycleEngine::sweep`].
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Memories transitioned `active -> aging`.
    pub aged: usize,
    /// Memories transitioned `aging -> archived`.
    pub archived: usize,
    /// Memories transitioned `resolved`/`archived -> tombstone`.
    pub tombstoned: usize,
}

/// Outcome of [`LifecycleEngine::gc`].
#[derive(Debug, Clone, Default)]
pub struct GcReport {
    /// Number of tombstones that would be / were removed.
    pub removed: usize,
    /// Whether this was a dry run (no mutation performed).
    pub dry_run: bool,
}

/// Computes decay-driven status transitions and retention (spec.md §4.8).
pub struct LifecycleEngine<'a> {
    config: &'a EngineConfig,
    index: &'a IndexStore,
}

impl<'a> LifecycleEngine<'a> {
    /// Builds a lifecycle engine over `index`, using `config`'s decay/
    /// archival/GC thresholds.
    #[must_use]
    pub fn new(config: &'a EngineConfig, index: &'a IndexStore) -> Self {
        Self { config, index }
    }

    /// `decay(timestamp) = 2^(-age_days / half_life_days)` (spec.md
    /// §4.8).
    #[must_use]
    pub fn decay(&self, timestamp: chrono::DateTime<Utc>) -> f64 {
        let age_days = (Utc::now() - timestamp).num_seconds() as f64 / 86_400.0;
        2f64.powf(-age_days.max(0.0) / self.config.decay_half_life_days)
    }

    /// Whether `id` was recalled (via `RecallEngine::search`/`hydrate`)
    /// more recently than one half-life ago, the "no recent access"
    /// conjunction the `active -> aging` transition requires alongside
    /// decay (spec.md §4.8) so memories under active use don't age out
    /// just because they're old.
    fn recently_accessed(&self, id: &crate::models::MemoryId, now: chrono::DateTime<Utc>) -> Result<bool, Error> {
        let Some(accessed) = self.index.last_accessed(id)? else {
            return Ok(false);
        };
        let since_days = (now - accessed).num_seconds() as f64 / 86_400.0;
        Ok(since_days < self.config.decay_half_life_days)
    }

    /// Runs the periodic transition sweep across every namespace:
    /// `active -> aging` when decay drops below 0.5, `aging -> archived`
    /// past `archive_after_days` (except active blockers), and
    /// `resolved`/`archived -> tombstone` past the GC horizon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query or update failure.
    #[tracing::instrument(skip(self))]
    pub fn sweep(&self) -> Result<SweepReport, Error> {
        let mut report = SweepReport::default();
        let now = Utc::now();

        for namespace in Namespace::all() {
            let memories = self.index.list_recent(Some(*namespace), usize::MAX)?;
            for memory in memories {
                let age_days = (now - memory.timestamp).num_seconds() as f64 / 86_400.0;

                match memory.status {
                    MemoryStatus::Active if *namespace != Namespace::Blockers => {
                        if self.decay(memory.timestamp) < 0.5 && !self.recently_accessed(&memory.id, now)? {
                            self.index.update(
                                &memory.id,
                                &MemoryPatch {
                                    status: Some(MemoryStatus::Aging),
                                    ..Default::default()
                                },
                            )?;
                            report.aged += 1;
                        }
                    }
                    MemoryStatus::Aging if age_days >= self.config.archive_after_days as f64 => {
                        let compacted = compact(&memory.content);
                        self.index.update(
                            &memory.id,
                            &MemoryPatch {
                                status: Some(MemoryStatus::Archived),
                                content: Some(compacted),
                                ..Default::default()
                            },
                        )?;
                        report.archived += 1;
                    }
                    MemoryStatus::Resolved | MemoryStatus::Archived
                        if age_days >= self.config.gc_horizon_days as f64 =>
                    {
                        self.index.update(
                            &memory.id,
                            &MemoryPatch {
                                status: Some(MemoryStatus::Tombstone),
                                content: Some(String::new()),
                                ..Default::default()
                            },
                        )?;
                        report.tombstoned += 1;
                    }
                    _ => {}
                }
            }
        }

        metrics::counter!("lifecycle_sweep_aged_total").increment(report.aged as u64);
        metrics::counter!("lifecycle_sweep_archived_total").increment(report.archived as u64);
        metrics::counter!("lifecycle_sweep_tombstoned_total").increment(report.tombstoned as u64);
        Ok(report)
    }

    /// Physically removes tombstones older than the GC horizon (git notes
    /// are marked removed via the caller's `GitNoteStore::remove`, not
    /// history-rewritten; this method only drops the index side of the
    /// retention, mirroring spec.md §3's "Lifecycle" note). When
    /// `dry_run` is true, counts eligible rows without deleting them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query or delete failure.
    #[tracing::instrument(skip(self))]
    pub fn gc(&self, dry_run: bool) -> Result<GcReport, Error> {
        let now = Utc::now();
        let mut removed = 0;
        for namespace in Namespace::all() {
            let memories = self.index.list_recent(Some(*namespace), usize::MAX)?;
            for memory in memories {
                if memory.status != MemoryStatus::Tombstone {
                    continue;
                }
                let age_days = (now - memory.timestamp).num_seconds() as f64 / 86_400.0;
                if age_days < self.config.gc_horizon_days as f64 {
                    continue;
                }
                if !dry_run {
                    self.index.delete(&memory.id)?;
                }
                removed += 1;
            }
        }
        metrics::counter!("lifecycle_gc_removed_total").increment(removed as u64);
        Ok(GcReport { removed, dry_run })
    }
}

/// Deterministic text compaction used by archival: keeps the first
/// sentence of every paragraph. No external compression dependency —
/// archived bodies remain plain UTF-8 text readable by `git notes show`.
fn compact(content: &str) -> String {
    content
        .split("\n\n")
        .map(|paragraph| paragraph.split_terminator(". ").next().unwrap_or(paragraph))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_is_one_at_zero_age() {
        let config = EngineConfig {
            decay_half_life_days: 30.0,
            ..test_config()
        };
        let index = IndexStore::open_in_memory().unwrap();
        let engine = LifecycleEngine::new(&config, &index);
        assert!((engine.decay(Utc::now()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decay_is_half_at_half_life() {
        let config = EngineConfig {
            decay_half_life_days: 30.0,
            ..test_config()
        };
        let index = IndexStore::open_in_memory().unwrap();
        let engine = LifecycleEngine::new(&config, &index);
        let timestamp = Utc::now() - chrono::Duration::days(30);
        assert!((engine.decay(timestamp) - 0.5).abs() < 0.01);
    }

    #[test]
    fn sweep_skips_aging_a_recently_accessed_memory() {
        let config = test_config();
        let index = IndexStore::open_in_memory().unwrap();
        let engine = LifecycleEngine::new(&config, &index);

        let memory = crate::models::Memory {
            id: crate::models::MemoryId::new_for(Namespace::Decisions, "abc1234", 0),
            commit_sha: "abc1234".to_string(),
            repo_path: "/repo".into(),
            namespace: Namespace::Decisions,
            summary: "old but read often".to_string(),
            content: "body".to_string(),
            timestamp: Utc::now() - chrono::Duration::days(60),
            spec: None,
            phase: None,
            tags: Vec::new(),
            status: MemoryStatus::Active,
            relates_to: Vec::new(),
        };
        index.upsert(&memory, None).unwrap();
        index.touch_accessed(&memory.id).unwrap();

        let report = engine.sweep().unwrap();
        assert_eq!(report.aged, 0);
        assert_eq!(index.get(&memory.id).unwrap().unwrap().status, MemoryStatus::Active);
    }

    #[test]
    fn compact_keeps_first_sentence_per_paragraph() {
        let content = "First sentence. Second sentence.\n\nAnother paragraph. More text.";
        let compacted = compact(content);
        assert_eq!(compacted, "First sentence\n\nAnother paragraph");
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            data_dir: std::env::temp_dir(),
            git_prefix: "mem".to_string(),
            embedding_model: "test".to_string(),
            embedding_dim: 8,
            max_content_bytes: 1024,
            max_summary_chars: 100,
            max_hydration_files: 20,
            max_file_bytes: 1024,
            capture_lock_timeout: std::time::Duration::from_secs(5),
            subprocess_timeout: std::time::Duration::from_secs(5),
            decay_half_life_days: 30.0,
            archive_after_days: 90,
            gc_horizon_days: 365,
            recall_cache_ttl: std::time::Duration::from_secs(60),
            recall_cache_entries: 10,
        }
    }
}
