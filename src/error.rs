//! Error types for the note service and its similarity index

use std::path::PathBuf;

use thiserror::Error;

use crate::notes::NoteId;

/// Result type alias for note service operations
pub type Result<T> = std::result::Result<T, NotesError>;

/// Error types that can occur in index, store, and service operations
#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate identifier: {id} is already indexed")]
    DuplicateIdentifier { id: NoteId },

    #[error("Corrupt index: {reason}")]
    CorruptIndex { reason: String },

    #[error("Failed to persist index to {path}: {source}")]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The primary store accepted the write but the paired index write failed.
    #[error("Note {id} {op} reached the note store but not the index: {source}")]
    IndexOutOfSync {
        id: NoteId,
        op: &'static str,
        #[source]
        source: Box<NotesError>,
    },

    #[error("Index lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<rusqlite::Error> for NotesError {
    fn from(e: rusqlite::Error) -> Self {
        NotesError::Database(e.to_string())
    }
}

impl NotesError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        NotesError::CorruptIndex {
            reason: reason.into(),
        }
    }
}
