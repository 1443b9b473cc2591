//! Runtime configuration and startup wiring.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use tracing::info;

use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::Result;
use crate::index::SimilarityIndex;
use crate::notes::SqliteNoteRepository;
use crate::service::NoteService;

/// Embedding backend selection.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Deterministic feature hashing, no model download
    Hashing,
    /// Local sentence-transformer model (requires the `fastembed` feature)
    Fastembed,
}

/// Storage and embedding settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory holding notes.db and the vectors/ index
    #[arg(long, env = "NOTES_DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// Embedding backend
    #[arg(long, env = "NOTES_EMBEDDER", value_enum, default_value = "hashing", global = true)]
    pub embedder: EmbedderKind,

    /// Embedding model name (fastembed backend)
    #[arg(long, env = "NOTES_MODEL", default_value = "all-MiniLM-L6-v2", global = true)]
    pub model: String,

    /// Vector dimension (hashing backend)
    #[arg(long, env = "NOTES_DIM", default_value_t = 384, global = true)]
    pub dim: usize,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("notes.db")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn model_cache_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Build the embedder. Runs once per process.
    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self.embedder {
            EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(self.dim)?)),
            #[cfg(feature = "fastembed")]
            EmbedderKind::Fastembed => Ok(Arc::new(crate::embedding::FastEmbedder::new(
                &self.model,
                self.model_cache_dir(),
            )?)),
            #[cfg(not(feature = "fastembed"))]
            EmbedderKind::Fastembed => Err(crate::error::NotesError::Embedding(
                "this build was compiled without the `fastembed` feature".to_string(),
            )),
        }
    }

    /// Open the note store, embedder, and index, and wire them into a service.
    pub fn open_service(&self) -> Result<NoteService> {
        std::fs::create_dir_all(&self.data_dir)?;

        let notes = Arc::new(SqliteNoteRepository::open(self.db_path())?);
        let embedder = self.build_embedder()?;
        let index = SimilarityIndex::open(self.index_dir(), embedder.dimension())?;

        info!(
            data_dir = %self.data_dir.display(),
            embedder = embedder.name(),
            dim = embedder.dimension(),
            vectors = index.len(),
            "note service ready"
        );
        NoteService::new(notes, embedder, index)
    }
}
