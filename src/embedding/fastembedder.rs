//! Local sentence-transformer embeddings via fastembed.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::Embedder;
use crate::error::{NotesError, Result};
use crate::vector::Vector;

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Load `model_name`, downloading it into `cache_dir` on first use.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self> {
        let model_enum = parse_model_name(model_name)?;

        std::fs::create_dir_all(&cache_dir)?;
        let options = InitOptions::new(model_enum)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| NotesError::Embedding(format!("model initialization failed: {}", e)))?;

        let dimension = model
            .embed(vec!["probe"], None)
            .map_err(|e| NotesError::Embedding(format!("failed to probe dimensions: {}", e)))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| NotesError::Embedding("model returned no embedding".to_string()))?;

        info!(model = model_name, dimension, "loaded embedding model");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

fn parse_model_name(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        _ => Err(NotesError::Embedding(format!(
            "unknown model: {}. Supported models: all-MiniLM-L6-v2, all-MiniLM-L6-v2-q, bge-small-en-v1.5, bge-base-en-v1.5",
            name
        ))),
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vector> {
        let mut model = self.model.lock().map_err(|_| NotesError::LockPoisoned)?;

        let embedding = model
            .embed(vec![text], None)
            .map_err(|e| NotesError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| NotesError::Embedding("no embedding returned".to_string()))?;

        let mut vector = Vector::new(embedding);
        if vector.norm() > 0.0 {
            vector.normalize()?;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
