//! `RecallEngine`: search, hydration, and scalar/vector combination
//! queries over captured memories (spec.md §4.6).

mod cache;

use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::git::GitNoteStore;
use crate::index::IndexStore;
use crate::models::{
    DetailLevel, HydratedMemory, Memory, MemoryId, MemoryResult, Namespace, SearchFilter,
};
use crate::Error;
use cache::QueryCache;
use std::collections::BTreeMap;

/// Additive re-ranking deltas applied to a copy of the raw KNN/FTS distance
/// (spec.md §4.6: "lowest wins").
#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    /// Subtracted per day of recency (newer memories rank closer).
    pub recency_boost_per_day: f32,
    /// Subtracted when the memory's namespace is in the caller's priority
    /// list.
    pub namespace_priority_boost: f32,
    /// Subtracted per matching tag.
    pub tag_boost: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            recency_boost_per_day: 0.001,
            namespace_priority_boost: 0.05,
            tag_boost: 0.02,
        }
    }
}

/// Context bundle for `RecallEngine::context`: memories grouped by
/// namespace.
pub type NamespaceContext = BTreeMap<Namespace, Vec<Memory>>;

/// Orchestrates recall over [`IndexStore`], [`Embedder`], and
/// [`GitNoteStore`] (spec.md §4.6).
pub struct RecallEngine<'a> {
    config: &'a EngineConfig,
    notes: &'a GitNoteStore,
    index: &'a IndexStore,
    embedder: &'a dyn Embedder,
    cache: QueryCache<Vec<MemoryResult>>,
}

impl<'a> RecallEngine<'a> {
    /// Builds a recall engine over the given collaborators.
    #[must_use]
    pub fn new(config: &'a EngineConfig, notes: &'a GitNoteStore, index: &'a IndexStore, embedder: &'a dyn Embedder) -> Self {
        let cache = QueryCache::new(config.recall_cache_entries, config.recall_cache_ttl);
        Self { config, notes, index, embedder, cache }
    }

    /// Embeds `query`, runs a KNN search with `filters`, optionally
    /// re-ranks, and returns at most `limit` results. Falls back to
    /// [`IndexStore::text_search`] if embedding fails (spec.md §4.6 error
    /// surface). Small LRU+TTL cache keyed on `(query, filters)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if both the vector and text search paths
    /// fail.
    #[tracing::instrument(skip(self, filters))]
    pub fn search(&self, query: &str, filters: &SearchFilter, limit: usize) -> Result<Vec<MemoryResult>, Error> {
        let cache_key = QueryCache::<Vec<MemoryResult>>::key(query, filters);
        if let Some(cached) = self.cache.get(cache_key) {
            self.touch_all(&cached);
            return Ok(cached);
        }

        let mut results = match self.embedder.embed(query) {
            Ok(vector) => self.index.knn(&vector, limit, filters)?,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed; falling back to text search");
                self.index.text_search(query, limit, filters)?
            }
        };

        rerank(&mut results, &RerankWeights::default(), &[], &[]);
        results.truncate(limit);
        self.touch_all(&results);
        self.cache.put(cache_key, results.clone());
        Ok(results)
    }

    /// Records every result's memory as accessed (spec.md §4.8's "no
    /// recent access" input to lifecycle decay), best-effort — a failure
    /// here shouldn't fail the read it's tracking.
    fn touch_all(&self, results: &[MemoryResult]) {
        for result in results {
            if let Err(e) = self.index.touch_accessed(&result.memory.id) {
                tracing::warn!(error = %e, "failed to record access for recency tracking");
            }
        }
    }

    /// Hydrates `memory` to `level` (spec.md §4.6, GLOSSARY).
    ///
    /// `SUMMARY` returns metadata only. `FULL` additionally loads the
    /// stored body (already present on `memory`, so this is a pass-
    /// through — the note text in git is the canonical source but the
    /// index already mirrors it). `FILES` additionally reads up to
    /// `max_hydration_files` changed file snapshots, each capped at
    /// `max_file_bytes`, using batched object retrieval. Hydration misses
    /// degrade to the best level available and are reported as
    /// `warnings` rather than aborting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] only for failures unrelated to missing
    /// objects (e.g. sanitization failures); missing-object failures are
    /// reported as warnings.
    #[tracing::instrument(skip(self, memory))]
    pub fn hydrate(&self, memory: Memory, level: DetailLevel) -> Result<HydratedMemory, Error> {
        if let Err(e) = self.index.touch_accessed(&memory.id) {
            tracing::warn!(error = %e, "failed to record access for recency tracking");
        }

        if level == DetailLevel::Summary {
            return Ok(HydratedMemory::summary_only(memory));
        }

        let full_body = Some(memory.content.clone());
        let mut warnings = Vec::new();

        if level == DetailLevel::Full {
            return Ok(HydratedMemory {
                memory,
                full_body,
                files: None,
                warnings,
            });
        }

        let info = match self.notes.commit_info(&memory.commit_sha) {
            Ok(info) => info,
            Err(e) => {
                warnings.push(format!("could not resolve commit info: {e}"));
                return Ok(HydratedMemory {
                    memory,
                    full_body,
                    files: None,
                    warnings,
                });
            }
        };

        let paths: Vec<String> = info
            .changed_paths
            .into_iter()
            .take(self.config.max_hydration_files)
            .collect();
        let files = match self.notes.batch_file_at(&memory.commit_sha, &paths) {
            Ok(files) => Some(files),
            Err(e) => {
                warnings.push(format!("could not read file snapshots: {e}"));
                None
            }
        };

        Ok(HydratedMemory {
            memory,
            full_body,
            files,
            warnings,
        })
    }

    /// Groups all memories for `spec` by namespace — a single scalar
    /// query (spec.md §4.6).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn context(&self, spec: &str) -> Result<NamespaceContext, Error> {
        let mut by_namespace: NamespaceContext = BTreeMap::new();
        for namespace in Namespace::all() {
            let memories: Vec<Memory> = self
                .index
                .list_recent(Some(*namespace), usize::MAX)?
                .into_iter()
                .filter(|m| m.spec.as_deref() == Some(spec))
                .collect();
            if !memories.is_empty() {
                by_namespace.insert(*namespace, memories);
            }
        }
        Ok(by_namespace)
    }

    /// Returns the most recently captured memories, optionally restricted
    /// to one namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn recent(&self, limit: usize, namespace: Option<Namespace>) -> Result<Vec<Memory>, Error> {
        self.index.list_recent(namespace, limit)
    }

    /// Finds the `k` memories most similar to `id`'s own embedding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` has no row, or [`Error::Index`]
    /// on a query failure.
    pub fn similar(&self, id: &MemoryId, k: usize) -> Result<Vec<MemoryResult>, Error> {
        let memory = self.index.get(id)?.ok_or_else(|| Error::NotFound(id.as_str().to_string()))?;
        let text = format!("{}\n\n{}", memory.summary, memory.content);
        let vector = self.embedder.embed(&text)?;
        let filter = SearchFilter::for_repo(memory.repo_path.clone());
        let mut results = self.index.knn(&vector, k + 1, &filter)?;
        results.retain(|r| r.memory.id != *id);
        results.truncate(k);
        Ok(results)
    }

    /// Returns every memory attached to `sha`, across all namespaces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    pub fn by_commit(&self, sha: &str) -> Result<Vec<Memory>, Error> {
        crate::git::sanitize::commit_sha(sha)?;
        let mut memories = Vec::new();
        for namespace in Namespace::all() {
            memories.extend(
                self.index
                    .list_recent(Some(*namespace), usize::MAX)?
                    .into_iter()
                    .filter(|m| m.commit_sha == sha),
            );
        }
        Ok(memories)
    }
}

fn rerank(results: &mut [MemoryResult], weights: &RerankWeights, priority_namespaces: &[Namespace], preferred_tags: &[String]) {
    let now = chrono::Utc::now();
    for result in results.iter_mut() {
        let age_days = (now - result.memory.timestamp).num_seconds() as f32 / 86_400.0;
        result.distance -= age_days.max(0.0) * weights.recency_boost_per_day;
        if priority_namespaces.contains(&result.memory.namespace) {
            result.distance -= weights.namespace_priority_boost;
        }
        let matching_tags = result.memory.tags.iter().filter(|t| preferred_tags.contains(t)).count();
        result.distance -= matching_tags as f32 * weights.tag_boost;
    }
    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}
