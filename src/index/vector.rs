//! Nearest-neighbor search over the `vectors` table.
//!
//! Default strategy is a linear scan (brute-force cosine distance),
//! adequate at the single-repo, single-host scale this system targets
//! (spec.md Non-goals: no server-grade concurrency). The `usearch-hnsw`
//! feature swaps in a real approximate index for larger corpora.

/// One candidate returned by a vector scan, before scalar filtering.
pub struct Candidate {
    /// Memory id as stored in `vectors.id`.
    pub id: String,
    /// Distance from the query vector (lower is closer).
    pub distance: f32,
}

/// Cosine distance (`1 - cosine_similarity`), so 0.0 means identical
/// direction and 2.0 means opposite.
///
/// `IndexStore::upsert` enforces a single fixed dimension for the whole
/// index (I3), so `a` and `b` should always be the same length here; a
/// mismatch would otherwise make `zip` silently compare a truncated
/// prefix and return a bogus distance, so it's treated as maximally far
/// instead.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (norm_a * norm_b))
}

/// Scans `rows` (id, embedding) and returns the `k` closest to `query` by
/// ascending distance. Over-fetches are the caller's responsibility when
/// combining with scalar filters (spec.md §4.4: over-fetch then filter).
#[must_use]
pub fn linear_knn(query: &[f32], rows: &[(String, Vec<f32>)], k: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = rows
        .iter()
        .map(|(id, embedding)| Candidate {
            id: id.clone(),
            distance: cosine_distance(query, embedding),
        })
        .collect();
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(k);
    candidates
}

#[cfg(feature = "usearch-hnsw")]
pub mod hnsw {
    //! Approximate nearest-neighbor search backed by `usearch`, enabled
    //! when the corpus outgrows a linear scan.

    use super::Candidate;
    use crate::error::IndexErrorKind;
    use crate::Error;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    /// A rebuildable `usearch` HNSW index over memory embeddings.
    pub struct HnswIndex {
        index: Index,
    }

    impl HnswIndex {
        /// Builds a fresh index for `dimensions`-length vectors.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Index`] if the underlying index cannot be
        /// constructed.
        pub fn new(dimensions: usize) -> Result<Self, Error> {
            let options = IndexOptions {
                dimensions,
                metric: MetricKind::Cos,
                quantization: ScalarKind::F32,
                ..Default::default()
            };
            let index = Index::new(&options)
                .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;
            Ok(Self { index })
        }

        /// Adds or replaces the vector for `key`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Index`] on insertion failure.
        pub fn upsert(&mut self, key: u64, vector: &[f32]) -> Result<(), Error> {
            if self.index.size() + 1 > self.index.capacity() {
                self.index
                    .reserve(self.index.capacity().max(1) * 2)
                    .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;
            }
            let _ = self.index.remove(key);
            self.index
                .add(key, vector)
                .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))
        }

        /// Searches for the `k` nearest neighbors of `query`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Index`] on search failure.
        pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, Error> {
            let matches = self
                .index
                .search(query, k)
                .map_err(|e| Error::index(IndexErrorKind::Schema, e.to_string()))?;
            Ok(matches
                .keys
                .into_iter()
                .zip(matches.distances)
                .map(|(key, distance)| Candidate {
                    id: key.to_string(),
                    distance,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_is_zero_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_rejects_mismatched_lengths_instead_of_truncating() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_distance(&a, &b), f32::MAX);
    }

    #[test]
    fn linear_knn_returns_closest_first() {
        let query = vec![1.0, 0.0];
        let rows = vec![
            ("far".to_string(), vec![0.0, 1.0]),
            ("near".to_string(), vec![0.9, 0.1]),
        ];
        let results = linear_knn(&query, &rows, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "near");
    }
}
