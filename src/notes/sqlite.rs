//! SQLite-backed note repository.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{split_tags, Note, NoteId, NoteInput, NoteRepository};
use crate::error::{NotesError, Result};

const SELECT_COLS: &str = "id, title, content, tags, category";

pub struct SqliteNoteRepository {
    conn: Mutex<Connection>,
}

impl SqliteNoteRepository {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn new(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| NotesError::LockPoisoned)
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            tags: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    }

    fn query_notes(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Note>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let notes = stmt
            .query_map(params, Self::row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            content TEXT,
            tags TEXT,
            category TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_notes_category ON notes(category);
        ",
    )
    .map_err(|e| NotesError::Database(format!("Migration failed: {e}")))
}

impl NoteRepository for SqliteNoteRepository {
    fn insert(&self, note: &NoteInput) -> Result<NoteId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notes (title, content, tags, category) VALUES (?1, ?2, ?3, ?4)",
            params![note.title, note.content, note.tags, note.category],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: NoteId) -> Result<Option<Note>> {
        let conn = self.conn()?;
        let note = conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE id = ?1", SELECT_COLS),
                params![id],
                Self::row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    fn list(&self) -> Result<Vec<Note>> {
        self.query_notes(
            &format!("SELECT {} FROM notes ORDER BY id DESC", SELECT_COLS),
            [],
        )
    }

    fn update(&self, id: NoteId, note: &NoteInput) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, tags = ?3, category = ?4 WHERE id = ?5",
            params![note.title, note.content, note.tags, note.category, id],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: NoteId) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn tags(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT tags FROM notes WHERE tags IS NOT NULL AND tags != ''")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let tags: BTreeSet<String> = rows
            .iter()
            .flat_map(|tags| split_tags(tags))
            .map(str::to_string)
            .collect();
        Ok(tags.into_iter().collect())
    }

    fn categories(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM notes
             WHERE category IS NOT NULL AND category != ''
             ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn filter_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
        self.query_notes(
            &format!(
                "SELECT {} FROM notes WHERE tags LIKE ?1 ORDER BY id DESC",
                SELECT_COLS
            ),
            params![format!("%{}%", tag)],
        )
    }

    fn filter_by_category(&self, category: &str) -> Result<Vec<Note>> {
        self.query_notes(
            &format!(
                "SELECT {} FROM notes WHERE category = ?1 ORDER BY id DESC",
                SELECT_COLS
            ),
            params![category],
        )
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SqliteNoteRepository {
        SqliteNoteRepository::in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let repo = repo();
        let id = repo
            .insert(&NoteInput::new("Title", "Body").with_tags("a,b").with_category("work"))
            .unwrap();

        let note = repo.get(id).unwrap().unwrap();
        assert_eq!(note.id, id);
        assert_eq!(note.title, "Title");
        assert_eq!(note.content, "Body");
        assert_eq!(note.tags, "a,b");
        assert_eq!(note.category, "work");
        assert!(repo.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let repo = repo();
        let first = repo.insert(&NoteInput::new("first", "")).unwrap();
        let second = repo.insert(&NoteInput::new("second", "")).unwrap();

        let ids: Vec<NoteId> = repo.list().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let repo = repo();
        let id = repo.insert(&NoteInput::new("old", "old body")).unwrap();

        assert!(repo.update(id, &NoteInput::new("new", "new body")).unwrap());
        assert_eq!(repo.get(id).unwrap().unwrap().title, "new");
        assert!(!repo.update(999, &NoteInput::new("x", "y")).unwrap());

        assert!(repo.delete(id).unwrap());
        assert!(!repo.delete(id).unwrap());
        assert!(repo.get(id).unwrap().is_none());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let repo = repo();
        let a = repo.insert(&NoteInput::new("a", "")).unwrap();
        repo.delete(a).unwrap();
        let b = repo.insert(&NoteInput::new("b", "")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_tags_and_categories() {
        let repo = repo();
        repo.insert(&NoteInput::new("1", "").with_tags("rust, cli").with_category("dev"))
            .unwrap();
        repo.insert(&NoteInput::new("2", "").with_tags("cli,notes,").with_category("home"))
            .unwrap();
        repo.insert(&NoteInput::new("3", "").with_category("dev")).unwrap();

        assert_eq!(repo.tags().unwrap(), vec!["cli", "notes", "rust"]);
        assert_eq!(repo.categories().unwrap(), vec!["dev", "home"]);
    }

    #[test]
    fn test_filters() {
        let repo = repo();
        let a = repo
            .insert(&NoteInput::new("a", "").with_tags("rust,cli").with_category("dev"))
            .unwrap();
        let b = repo
            .insert(&NoteInput::new("b", "").with_tags("cooking").with_category("home"))
            .unwrap();

        let by_tag: Vec<NoteId> = repo.filter_by_tag("cli").unwrap().iter().map(|n| n.id).collect();
        assert_eq!(by_tag, vec![a]);

        let by_category: Vec<NoteId> = repo
            .filter_by_category("home")
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(by_category, vec![b]);
        assert!(repo.filter_by_category("Home").unwrap().is_empty());
    }
}
