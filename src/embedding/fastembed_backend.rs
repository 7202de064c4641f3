//! Real semantic embeddings via `fastembed`, gated behind the
//! `fastembed-embeddings` feature (spec.md §4.3). Model initialization
//! happens once, lazily, on first use.

use super::Embedder;
use crate::error::EmbeddingErrorKind;
use crate::Error;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use std::sync::Mutex;

/// `fastembed`-backed embedder. The underlying model is loaded at most once
/// per process, on the first call to [`Embedder::embed`] or
/// [`Embedder::embed_batch`].
pub struct FastEmbedEmbedder {
    model_name: String,
    dimensions: usize,
    inner: OnceCell<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    /// Configures (but does not yet load) a `fastembed` embedder for
    /// `model_name`, expected to produce vectors of `dimensions` length.
    #[must_use]
    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
            inner: OnceCell::new(),
        }
    }

    fn model(&self) -> Result<&Mutex<TextEmbedding>, Error> {
        self.inner.get_or_try_init(|| {
            tracing::info!(model = %self.model_name, "loading fastembed model");
            let model = resolve_model(&self.model_name)?;
            let embedding = TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
                .map_err(|e| Error::embedding(EmbeddingErrorKind::Load, e.to_string()))?;
            Ok(Mutex::new(embedding))
        })
    }
}

fn resolve_model(name: &str) -> Result<EmbeddingModel, Error> {
    match name {
        "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(Error::embedding(
            EmbeddingErrorKind::Load,
            format!("unknown embedding model: {other}"),
        )),
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let mut results = self.embed_batch(std::slice::from_ref(&text.to_string()))?;
        Ok(results.pop().unwrap_or_default())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        let model = self.model()?;
        let guard = model.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let documents: Vec<&str> = texts.iter().map(String::as_str).collect();
        guard
            .embed(documents, None)
            .map_err(|e| Error::embedding(EmbeddingErrorKind::Inference, e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
