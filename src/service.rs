//! Note lifecycle and search on top of the primary store and similarity index.
//!
//! Every lifecycle write touches the primary store first and the index
//! second, under the index write lock, so a failed index write leaves a note
//! that exists but is not semantically searchable. The reverse would leave a
//! vector pointing at a missing note. Embeddings are computed before either
//! store is touched.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::error::{NotesError, Result};
use crate::index::SimilarityIndex;
use crate::notes::{Note, NoteId, NoteInput, NoteRepository};

/// Default number of search results.
pub const DEFAULT_TOP_K: usize = 5;

/// How a search query is matched against notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Case-insensitive substring match over title, content, and tags.
    Keyword,
    /// Cosine similarity between the query and note embeddings.
    #[default]
    Semantic,
}

/// A search result. `score` is set for semantic matches only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredNote {
    #[serde(flatten)]
    pub note: Note,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Shared handle owning the note store, the embedder, and the index.
pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
    embedder: Arc<dyn Embedder>,
    index: RwLock<SimilarityIndex>,
}

impl NoteService {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        embedder: Arc<dyn Embedder>,
        index: SimilarityIndex,
    ) -> Result<Self> {
        if embedder.dimension() != index.dim() {
            return Err(NotesError::DimensionMismatch {
                expected: index.dim(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            notes,
            embedder,
            index: RwLock::new(index),
        })
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, SimilarityIndex>> {
        self.index.read().map_err(|_| NotesError::LockPoisoned)
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, SimilarityIndex>> {
        self.index.write().map_err(|_| NotesError::LockPoisoned)
    }

    /// Store a new note and index its embedding.
    pub fn create(&self, input: &NoteInput) -> Result<NoteId> {
        let vector = self.embedder.embed(&input.embedding_text())?;

        let mut index = self.write_index()?;
        let id = self.notes.insert(input)?;
        index
            .add(&vector, id)
            .map_err(|e| out_of_sync(id, "create", e))?;

        info!(id, "created note");
        Ok(id)
    }

    /// Overwrite a note and its embedding. `None` if the note does not exist.
    pub fn update(&self, id: NoteId, input: &NoteInput) -> Result<Option<Note>> {
        if self.notes.get(id)?.is_none() {
            return Ok(None);
        }
        let vector = self.embedder.embed(&input.embedding_text())?;

        let mut index = self.write_index()?;
        if !self.notes.update(id, input)? {
            return Ok(None);
        }
        let replaced = index
            .replace(id, &vector)
            .map_err(|e| out_of_sync(id, "update", e))?;
        if !replaced {
            warn!(id, "note had no vector, indexing it now");
            index
                .add(&vector, id)
                .map_err(|e| out_of_sync(id, "update", e))?;
        }

        info!(id, "updated note");
        Ok(Some(input.clone().into_note(id)))
    }

    /// Delete a note and its vector. `false` if the note does not exist.
    ///
    /// A vector left behind by an earlier failed delete is removed even when
    /// the note itself is already gone.
    pub fn delete(&self, id: NoteId) -> Result<bool> {
        let mut index = self.write_index()?;
        if !self.notes.delete(id)? {
            if index.contains(id) {
                warn!(id, "removing vector of an already deleted note");
                index
                    .remove(id)
                    .map_err(|e| out_of_sync(id, "delete", e))?;
            }
            return Ok(false);
        }
        let removed = index
            .remove(id)
            .map_err(|e| out_of_sync(id, "delete", e))?;
        if !removed {
            warn!(id, "deleted note had no vector");
        }

        info!(id, "deleted note");
        Ok(true)
    }

    pub fn get(&self, id: NoteId) -> Result<Option<Note>> {
        self.notes.get(id)
    }

    pub fn list(&self) -> Result<Vec<Note>> {
        self.notes.list()
    }

    /// Search notes by keyword or meaning, returning at most `k` results.
    pub fn search(&self, query: &str, mode: SearchMode, k: usize) -> Result<Vec<ScoredNote>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NotesError::InvalidQuery(
                "query parameter 'q' required".to_string(),
            ));
        }

        let results = match mode {
            SearchMode::Keyword => self.keyword_search(query, k)?,
            SearchMode::Semantic => self.semantic_search(query, k)?,
        };
        debug!(?mode, k, hits = results.len(), "search");
        Ok(results)
    }

    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredNote>> {
        let needle = query.to_lowercase();
        Ok(self
            .notes
            .list()?
            .into_iter()
            .filter(|note| note.matches_keyword(&needle))
            .take(k)
            .map(|note| ScoredNote { note, score: None })
            .collect())
    }

    fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<ScoredNote>> {
        let vector = self.embedder.embed(query)?;
        let hits = self.read_index()?.search(&vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.notes.get(hit.id)? {
                Some(note) => results.push(ScoredNote {
                    note,
                    score: Some(hit.score),
                }),
                None => warn!(id = hit.id, "indexed note missing from store"),
            }
        }
        Ok(results)
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        self.notes.tags()
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        self.notes.categories()
    }

    pub fn filter_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
        self.notes.filter_by_tag(tag)
    }

    pub fn filter_by_category(&self, category: &str) -> Result<Vec<Note>> {
        self.notes.filter_by_category(category)
    }

    pub fn note_count(&self) -> Result<usize> {
        self.notes.count()
    }

    /// Number of notes with an indexed vector.
    pub fn index_len(&self) -> Result<usize> {
        Ok(self.read_index()?.len())
    }

    /// Index dimension.
    pub fn dim(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }
}

fn out_of_sync(id: NoteId, op: &'static str, source: NotesError) -> NotesError {
    warn!(id, op, error = %source, "note store written but index write failed");
    NotesError::IndexOutOfSync {
        id,
        op,
        source: Box::new(source),
    }
}
