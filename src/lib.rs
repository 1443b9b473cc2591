//! # Semantic Notes
//!
//! A personal note-taking service with keyword and meaning-based search.
//!
//! This library provides:
//! - A brute-force cosine similarity index keyed by note ID
//! - Crash-safe two-file persistence (`embeddings.npy` + `map.json`)
//! - Pluggable text embedders
//! - A SQLite note store and the service that keeps it in step with the index
//! - An HTTP API
//!
//! ## Example
//!
//! ```rust
//! use semantic_notes::{SimilarityIndex, Vector};
//!
//! let mut index = SimilarityIndex::in_memory(3);
//! index.add(&Vector::new(vec![1.0, 0.0, 0.0]), 1).unwrap();
//! index.add(&Vector::new(vec![0.0, 1.0, 0.0]), 2).unwrap();
//!
//! let query = Vector::new(vec![0.9, 0.1, 0.0]).normalized().unwrap();
//! let hits = index.search(&query, 2).unwrap();
//! assert_eq!(hits[0].id, 1);
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod metrics;
pub mod notes;
pub mod persistence;
pub mod server;
pub mod service;
pub mod vector;

pub use config::{Config, EmbedderKind};
pub use embedding::{Embedder, HashingEmbedder};
pub use error::{NotesError, Result};
pub use index::{SearchHit, SimilarityIndex};
pub use notes::{Note, NoteId, NoteInput, NoteRepository, SqliteNoteRepository};
pub use service::{NoteService, ScoredNote, SearchMode};
pub use vector::Vector;
