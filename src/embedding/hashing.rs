//! Deterministic feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed with CRC32; the low bits pick
//! a bucket and the top bit picks the sign. The bucket counts are then
//! L2-normalized. Texts sharing words land close together, which is enough
//! for offline use and tests without downloading a model.

use super::Embedder;
use crate::error::{NotesError, Result};
use crate::vector::Vector;

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(NotesError::Embedding(
                "hashing embedder needs a non-zero dimension".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for HashingEmbedder {
    /// Text without any tokens embeds to the zero vector.
    fn embed(&self, text: &str) -> Result<Vector> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let hash = crc32fast::hash(token.as_bytes());
            let bucket = (hash & 0x7fff_ffff) as usize % self.dimension;
            let sign = if hash >> 31 == 0 { 1.0 } else { -1.0 };
            buckets[bucket] += sign;
        }

        let mut vector = Vector::new(buckets);
        if vector.norm() > 0.0 {
            vector.normalize()?;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
