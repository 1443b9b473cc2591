//! Note records and the primary record store.

mod sqlite;

pub use sqlite::SqliteNoteRepository;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Primary-store identifier of a note; also the similarity index key.
pub type NoteId = i64;

/// A stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Comma-separated tag list.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: String,
}

/// The writable fields of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: String,
}

impl NoteInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// The text fed to the embedder for this note.
    pub fn embedding_text(&self) -> String {
        format!("{}. {} {}", self.title, self.content, self.tags)
    }

    pub(crate) fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            title: self.title,
            content: self.content,
            tags: self.tags,
            category: self.category,
        }
    }
}

impl Note {
    /// Individual tags, trimmed, without empties.
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags).collect()
    }

    /// Case-insensitive substring match over title, content, and tags.
    /// `needle` must already be lower-cased.
    pub fn matches_keyword(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.tags.to_lowercase().contains(needle)
    }
}

pub(crate) fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// The primary record store: source of truth for note existence.
pub trait NoteRepository: Send + Sync {
    /// Insert a note, returning its newly assigned identifier.
    fn insert(&self, note: &NoteInput) -> Result<NoteId>;

    fn get(&self, id: NoteId) -> Result<Option<Note>>;

    /// All notes, newest (highest id) first.
    fn list(&self) -> Result<Vec<Note>>;

    /// Returns `false` if no note has this identifier.
    fn update(&self, id: NoteId, note: &NoteInput) -> Result<bool>;

    /// Returns `false` if no note has this identifier.
    fn delete(&self, id: NoteId) -> Result<bool>;

    /// Distinct tags across all notes, sorted.
    fn tags(&self) -> Result<Vec<String>>;

    /// Distinct non-empty categories, sorted.
    fn categories(&self) -> Result<Vec<String>>;

    /// Notes whose tag string contains `tag`, newest first.
    fn filter_by_tag(&self, tag: &str) -> Result<Vec<Note>>;

    /// Notes in exactly `category`, newest first.
    fn filter_by_category(&self, category: &str) -> Result<Vec<Note>>;

    fn count(&self) -> Result<usize>;
}
