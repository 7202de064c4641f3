//! Text-to-vector embedding (spec.md §4.3).
//!
//! [`Embedder`] is a single-capability trait: map text to a fixed-dimension
//! vector. [`fallback::FallbackEmbedder`] is always available and
//! dependency-free; the optional `fastembed-embeddings` feature adds
//! [`fastembed_backend::FastEmbedEmbedder`] for real semantic vectors.

mod fallback;
#[cfg(feature = "fastembed-embeddings")]
mod fastembed_backend;

pub use fallback::FallbackEmbedder;
#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_backend::FastEmbedEmbedder;

use crate::Error;

/// Maps text to a fixed-dimension real vector. Implementations perform
/// lazy, one-time model initialization on first use (spec.md §4.3).
pub trait Embedder: Send + Sync {
    /// Embeds a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] on model load failure, OOM, or a
    /// downstream inference error.
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Embeds a batch of texts, amortizing model overhead where possible.
    /// The default implementation calls [`Embedder::embed`] per item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] under the same conditions as
    /// [`Embedder::embed`].
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The fixed dimension every vector this embedder returns will have.
    fn dimensions(&self) -> usize;
}
