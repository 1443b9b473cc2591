//! Text embedders that turn note text into unit vectors.
//!
//! Implementations are built once at startup and shared behind an
//! `Arc<dyn Embedder>`.

mod hashing;

#[cfg(feature = "fastembed")]
mod fastembedder;

pub use hashing::HashingEmbedder;

#[cfg(feature = "fastembed")]
pub use fastembedder::FastEmbedder;

use crate::error::Result;
use crate::vector::Vector;

/// Maps text to a fixed-dimension, L2-normalized vector.
pub trait Embedder: Send + Sync {
    /// Embed a single text. Output length is always `dimension()`.
    fn embed(&self, text: &str) -> Result<Vector>;

    /// Output dimension, stable for the lifetime of the embedder.
    fn dimension(&self) -> usize;

    /// Human-readable model name.
    fn name(&self) -> &str;
}
