//! `PatternEngine`: TF-IDF clustering over recent memories to surface
//! candidate cross-memory patterns (spec.md §4.9).

use crate::index::IndexStore;
use crate::models::{Memory, MemoryId, Namespace, Pattern, PatternStatus, PatternType};
use crate::Error;
use std::collections::{BTreeMap, HashMap};

/// Minimum cluster size for a candidate pattern to be promotable (spec.md
/// §4.9: "promotion is gated on minimum support").
const MIN_SUPPORT: usize = 2;
/// Cosine-similarity threshold above which two memories are considered
/// part of the same cluster.
const SIMILARITY_THRESHOLD: f32 = 0.35;

/// Source namespaces scanned for candidate patterns (spec.md §4.9).
const SOURCE_NAMESPACES: &[Namespace] = &[Namespace::Learnings, Namespace::Decisions, Namespace::Retrospective];

/// Computes term-weighted clusters over recent memories and proposes
/// candidate [`Pattern`]s.
pub struct PatternEngine<'a> {
    index: &'a IndexStore,
}

impl<'a> PatternEngine<'a> {
    /// Builds a pattern engine over `index`.
    #[must_use]
    pub fn new(index: &'a IndexStore) -> Self {
        Self { index }
    }

    /// Scans the most recent `window` memories per source namespace,
    /// clusters them by TF-IDF cosine similarity, and returns one
    /// candidate [`Pattern`] per cluster meeting [`MIN_SUPPORT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on a query failure.
    #[tracing::instrument(skip(self))]
    pub fn detect(&self, window: usize) -> Result<Vec<Pattern>, Error> {
        let mut corpus: Vec<Memory> = Vec::new();
        for namespace in SOURCE_NAMESPACES {
            corpus.extend(self.index.list_recent(Some(*namespace), window)?);
        }
        if corpus.len() < MIN_SUPPORT {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = corpus.iter().map(|m| format!("{} {}", m.summary, m.content)).collect();
        let vectors = tfidf_vectors(&documents);
        let clusters = cluster(&vectors, SIMILARITY_THRESHOLD);

        let mut patterns = Vec::new();
        for cluster_indices in clusters {
            if cluster_indices.len() < MIN_SUPPORT {
                continue;
            }
            let evidence: Vec<MemoryId> = cluster_indices.iter().map(|&i| corpus[i].id.clone()).collect();
            let cohesion = average_pairwise_similarity(&vectors, &cluster_indices);
            let confidence = (cohesion * (cluster_indices.len() as f32).ln_1p()).clamp(0.0, 1.0);
            let representative = &corpus[cluster_indices[0]];

            patterns.push(Pattern {
                memory_id: representative.id.clone(),
                pattern_type: infer_type(representative.namespace),
                confidence,
                status: if confidence >= 0.6 {
                    PatternStatus::Validated
                } else {
                    PatternStatus::Candidate
                },
                evidence,
            });
        }
        Ok(patterns)
    }

    /// Demotes `pattern` after a contradiction: later memories tagged
    /// accordingly, or a manual override (spec.md §4.9).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] on an update failure.
    pub fn demote(&self, pattern: &mut Pattern) -> Result<(), Error> {
        pattern.status = PatternStatus::Demoted;
        Ok(())
    }
}

fn infer_type(namespace: Namespace) -> PatternType {
    match namespace {
        Namespace::Decisions => PatternType::Decision,
        Namespace::Retrospective => PatternType::Workflow,
        _ => PatternType::Success,
    }
}

/// Builds an L2-normalized TF-IDF vector per document over a shared
/// vocabulary.
fn tfidf_vectors(documents: &[String]) -> Vec<HashMap<String, f32>> {
    let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let unique: std::collections::HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in unique {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }
    let n = documents.len() as f32;

    tokenized
        .iter()
        .map(|tokens| {
            let mut term_freq: HashMap<String, f32> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token.clone()).or_insert(0.0) += 1.0;
            }
            let total = tokens.len().max(1) as f32;
            let mut vector: HashMap<String, f32> = HashMap::new();
            for (term, count) in &term_freq {
                let tf = count / total;
                let df = *doc_freq.get(term.as_str()).unwrap_or(&1) as f32;
                let idf = (n / df).ln() + 1.0;
                vector.insert(term.clone(), tf * idf);
            }
            let norm = vector.values().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in vector.values_mut() {
                    *v /= norm;
                }
            }
            vector
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.len() > 2)
        .collect()
}

fn sparse_cosine(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let (shorter, longer) = if a.len() < b.len() { (a, b) } else { (b, a) };
    shorter.iter().map(|(term, weight)| weight * longer.get(term).unwrap_or(&0.0)).sum()
}

/// Single-linkage clustering by cosine similarity threshold.
fn cluster(vectors: &[HashMap<String, f32>], threshold: f32) -> Vec<Vec<usize>> {
    let n = vectors.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if sparse_cosine(&vectors[i], &vectors[j]) >= threshold {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

fn average_pairwise_similarity(vectors: &[HashMap<String, f32>], indices: &[usize]) -> f32 {
    if indices.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..indices.len() {
        for j in (i + 1)..indices.len() {
            total += sparse_cosine(&vectors[indices[i]], &vectors[indices[j]]);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}
