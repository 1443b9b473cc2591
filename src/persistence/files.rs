//! Two-file persisted image of the similarity index.
//!
//! `embeddings.npy` holds the `(N, dim)` f32 matrix and `map.json` the N note
//! identifiers in row order. A save writes both to `*.tmp` siblings, fsyncs
//! them, then renames the vector file (the commit point) followed by the
//! identifier file. `load` repairs an interrupted save before reading:
//!
//! - `embeddings.npy.tmp` still present: the commit never happened, both temp
//!   files are discarded and the previous image stays authoritative.
//! - only `map.json.tmp` present: the commit happened, the identifier rename
//!   is rolled forward.

use crate::error::{NotesError, Result};
use crate::notes::NoteId;
use crate::persistence::npy;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const VECTORS_FILE: &str = "embeddings.npy";
pub const IDS_FILE: &str = "map.json";

/// The index image as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedIndex {
    pub ids: Vec<NoteId>,
    pub dim: usize,
    /// Row-major `ids.len() x dim` matrix.
    pub data: Vec<f32>,
}

/// Manages the vector and identifier files inside one directory.
#[derive(Debug, Clone)]
pub struct IndexFiles {
    dir: PathBuf,
}

impl IndexFiles {
    /// Create a file manager for the given directory, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn ids_path(&self) -> PathBuf {
        self.dir.join(IDS_FILE)
    }

    /// Persist the full index image.
    pub fn save(&self, ids: &[NoteId], dim: usize, data: &[f32]) -> Result<()> {
        let vectors = self.vectors_path();
        let id_map = self.ids_path();
        let vectors_tmp = tmp_path(&vectors);
        let id_map_tmp = tmp_path(&id_map);

        let id_bytes = serde_json::to_vec(ids).map_err(|e| NotesError::PersistenceFailure {
            path: id_map_tmp.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        // A deferred identifier rename belongs to the committed image; finish it
        // before staging can overwrite or clean up its temp file.
        if id_map_tmp.exists() {
            fs::rename(&id_map_tmp, &id_map).map_err(|source| NotesError::PersistenceFailure {
                path: id_map.clone(),
                source,
            })?;
            info!(path = %id_map.display(), "completed deferred identifier rename");
        }

        let staged = write_synced(&vectors_tmp, &npy::encode(ids.len(), dim, data))
            .and_then(|()| write_synced(&id_map_tmp, &id_bytes));
        if let Err(e) = staged {
            let _ = fs::remove_file(&vectors_tmp);
            let _ = fs::remove_file(&id_map_tmp);
            return Err(e);
        }

        if let Err(source) = fs::rename(&vectors_tmp, &vectors) {
            let _ = fs::remove_file(&vectors_tmp);
            let _ = fs::remove_file(&id_map_tmp);
            return Err(NotesError::PersistenceFailure {
                path: vectors,
                source,
            });
        }

        // Committed: a failure past this point is repaired by the next load.
        if let Err(e) = fs::rename(&id_map_tmp, &id_map) {
            warn!(error = %e, path = %id_map.display(), "identifier rename deferred to next load");
        }
        if let Err(e) = sync_dir(&self.dir) {
            warn!(error = %e, dir = %self.dir.display(), "failed to sync index directory");
        }

        debug!(rows = ids.len(), dim, "index saved");
        Ok(())
    }

    /// Load the persisted image, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<PersistedIndex>> {
        self.recover()?;

        let vectors = self.vectors_path();
        let id_map = self.ids_path();

        match (vectors.exists(), id_map.exists()) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(NotesError::corrupt(format!(
                    "{} exists without {}",
                    vectors.display(),
                    id_map.display()
                )))
            }
            (false, true) => {
                return Err(NotesError::corrupt(format!(
                    "{} exists without {}",
                    id_map.display(),
                    vectors.display()
                )))
            }
            (true, true) => {}
        }

        let matrix = npy::decode(&read(&vectors)?)?;
        let ids: Vec<NoteId> = serde_json::from_slice(&read(&id_map)?).map_err(|e| {
            NotesError::corrupt(format!("{} is not an identifier list: {}", id_map.display(), e))
        })?;

        if ids.len() != matrix.rows {
            return Err(NotesError::corrupt(format!(
                "{} has {} rows but {} lists {} identifiers",
                vectors.display(),
                matrix.rows,
                id_map.display(),
                ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(NotesError::corrupt(format!(
                "identifier {} appears more than once in {}",
                dup,
                id_map.display()
            )));
        }

        Ok(Some(PersistedIndex {
            ids,
            dim: matrix.cols,
            data: matrix.data,
        }))
    }

    /// Finish or discard a save that was interrupted mid-way.
    fn recover(&self) -> Result<()> {
        let vectors_tmp = tmp_path(&self.vectors_path());
        let id_map_tmp = tmp_path(&self.ids_path());

        if vectors_tmp.exists() {
            fs::remove_file(&vectors_tmp)?;
            if id_map_tmp.exists() {
                fs::remove_file(&id_map_tmp)?;
            }
            info!(dir = %self.dir.display(), "discarded uncommitted index write");
        } else if id_map_tmp.exists() {
            fs::rename(&id_map_tmp, self.ids_path())?;
            info!(dir = %self.dir.display(), "completed interrupted index commit");
        }
        Ok(())
    }
}

/// `path` with `.tmp` appended to its file name.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let write = || -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write().map_err(|source| NotesError::PersistenceFailure {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| NotesError::corrupt(format!("cannot read {}: {}", path.display(), e)))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
