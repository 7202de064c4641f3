//! Deterministic, dependency-free embedder used when no model-backed
//! embedder is configured, and as the fail-soft target when one fails to
//! load (spec.md §4.3, §7: capture/recall degrade rather than abort).

use super::Embedder;
use crate::Error;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hashing-trick bag-of-words embedder: each whitespace-delimited token is
/// hashed into one of `dimensions` buckets and accumulated with a sign
/// derived from a second hash, then the vector is L2-normalized. Carries
/// no model weights and never fails.
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    /// Builds a fallback embedder producing vectors of `dimensions` length.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for FallbackEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return Ok(vector);
        }
        for token in text.split_whitespace().map(str::to_lowercase) {
            let mut bucket_hasher = DefaultHasher::new();
            token.hash(&mut bucket_hasher);
            let bucket = (bucket_hasher.finish() as usize) % self.dimensions;

            let mut sign_hasher = DefaultHasher::new();
            (&token, "sign").hash(&mut sign_hasher);
            let sign = if sign_hasher.finish() % 2 == 0 { 1.0 } else { -1.0 };

            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_to_the_configured_dimension() {
        let embedder = FallbackEmbedder::new(384);
        let vector = embedder.embed("hello world").unwrap();
        assert_eq!(vector.len(), 384);
    }

    #[test]
    fn is_deterministic() {
        let embedder = FallbackEmbedder::new(64);
        let a = embedder.embed("the quick brown fox").unwrap();
        let b = embedder.embed("the quick brown fox").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_text() {
        let embedder = FallbackEmbedder::new(64);
        let a = embedder.embed("decisions about storage").unwrap();
        let b = embedder.embed("blockers in the pipeline").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let embedder = FallbackEmbedder::new(32);
        let vector = embedder.embed("").unwrap();
        assert!(vector.iter().all(|&v| v == 0.0));
    }
}
