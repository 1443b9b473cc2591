//! Brute-force similarity index over unit-normalized note embeddings.
//!
//! The index keeps two parallel sequences: note identifiers and a row-major
//! `N x dim` matrix. Row `i` of the matrix belongs to `ids[i]`. Rows are
//! appended on insert, overwritten in place on replace, and removed with the
//! following rows shifted up on remove. Every mutation rewrites the persisted
//! image before returning; if that write fails the in-memory change is undone
//! so memory never runs ahead of disk.
//!
//! Scores are plain dot products. Callers pass unit-normalized vectors, which
//! makes the dot product equal to cosine similarity.

pub mod ranking;

use std::path::Path;

use ndarray::{ArrayView1, ArrayView2};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{NotesError, Result};
use crate::notes::NoteId;
use crate::persistence::IndexFiles;
use crate::vector::Vector;

/// A single search hit: the note identifier and its cosine score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: NoteId,
    pub score: f32,
}

/// Exact nearest-neighbor index keyed by note identifier.
#[derive(Debug)]
pub struct SimilarityIndex {
    dim: usize,
    ids: Vec<NoteId>,
    /// Row-major `ids.len() x dim` matrix.
    data: Vec<f32>,
    /// `None` for an ephemeral index that is never written to disk.
    files: Option<IndexFiles>,
}

impl SimilarityIndex {
    /// Open the index persisted in `dir`, or start an empty one of dimension `dim`.
    pub fn open(dir: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let files = IndexFiles::new(dir)?;

        let (ids, data) = match files.load()? {
            Some(image) => {
                if image.dim != dim {
                    return Err(NotesError::DimensionMismatch {
                        expected: dim,
                        actual: image.dim,
                    });
                }
                info!(
                    rows = image.ids.len(),
                    dim,
                    dir = %files.dir().display(),
                    "loaded similarity index"
                );
                (image.ids, image.data)
            }
            None => {
                info!(dim, dir = %files.dir().display(), "starting empty similarity index");
                (Vec::new(), Vec::new())
            }
        };

        Ok(Self {
            dim,
            ids,
            data,
            files: Some(files),
        })
    }

    /// Create an empty index that lives only in memory.
    pub fn in_memory(dim: usize) -> Self {
        Self {
            dim,
            ids: Vec::new(),
            data: Vec::new(),
            files: None,
        }
    }

    /// Append a vector for a note that is not yet indexed.
    pub fn add(&mut self, vector: &Vector, id: NoteId) -> Result<()> {
        self.check_dimension(vector)?;
        if self.contains(id) {
            return Err(NotesError::DuplicateIdentifier { id });
        }

        self.ids.push(id);
        self.data.extend_from_slice(vector.as_slice());

        if let Err(e) = self.save() {
            self.ids.pop();
            self.data.truncate(self.ids.len() * self.dim);
            return Err(e);
        }
        debug!(id, rows = self.len(), "indexed note");
        Ok(())
    }

    /// Overwrite the vector stored for `id`. Returns `false` if `id` is not indexed.
    pub fn replace(&mut self, id: NoteId, vector: &Vector) -> Result<bool> {
        self.check_dimension(vector)?;
        let Some(pos) = self.position(id) else {
            return Ok(false);
        };

        let range = self.row_range(pos);
        let previous = self.data[range.clone()].to_vec();
        self.data[range.clone()].copy_from_slice(vector.as_slice());

        if let Err(e) = self.save() {
            self.data[range].copy_from_slice(&previous);
            return Err(e);
        }
        debug!(id, "replaced note vector");
        Ok(true)
    }

    /// Remove the row for `id`. Returns `false` if `id` is not indexed.
    pub fn remove(&mut self, id: NoteId) -> Result<bool> {
        let Some(pos) = self.position(id) else {
            return Ok(false);
        };

        let range = self.row_range(pos);
        self.ids.remove(pos);
        let removed: Vec<f32> = self.data.drain(range.clone()).collect();

        if let Err(e) = self.save() {
            self.ids.insert(pos, id);
            let tail = self.data.split_off(range.start);
            self.data.extend(removed);
            self.data.extend(tail);
            return Err(e);
        }
        debug!(id, rows = self.len(), "removed note vector");
        Ok(true)
    }

    /// The `top_k` rows most similar to `query`, best first.
    pub fn search(&self, query: &Vector, top_k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let scores = self.matrix()?.dot(&ArrayView1::from(query.as_slice()));
        let scores = scores.to_vec();

        Ok(ranking::top_k(&scores, top_k)
            .into_iter()
            .map(|(pos, score)| SearchHit {
                id: self.ids[pos],
                score,
            })
            .collect())
    }

    /// Number of indexed notes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimension fixed at construction.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Identifiers in row order.
    pub fn ids(&self) -> &[NoteId] {
        &self.ids
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.position(id).is_some()
    }

    /// The stored vector for `id`.
    pub fn get(&self, id: NoteId) -> Option<&[f32]> {
        self.position(id).map(|pos| &self.data[self.row_range(pos)])
    }

    fn position(&self, id: NoteId) -> Option<usize> {
        self.ids.iter().position(|&stored| stored == id)
    }

    fn row_range(&self, pos: usize) -> std::ops::Range<usize> {
        pos * self.dim..(pos + 1) * self.dim
    }

    fn matrix(&self) -> Result<ArrayView2<'_, f32>> {
        ArrayView2::from_shape((self.ids.len(), self.dim), &self.data)
            .map_err(|e| NotesError::corrupt(format!("vector matrix has the wrong shape: {}", e)))
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.dimension() != self.dim {
            return Err(NotesError::DimensionMismatch {
                expected: self.dim,
                actual: vector.dimension(),
            });
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        match &self.files {
            Some(files) => files.save(&self.ids, self.dim, &self.data),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn v(data: &[f32]) -> Vector {
        Vector::new(data.to_vec())
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let mut index = SimilarityIndex::in_memory(3);
        index.add(&v(&[1.0, 0.0, 0.0]), 1).unwrap();
        index.add(&v(&[0.0, 1.0, 0.0]), 2).unwrap();

        let query = v(&[0.9, 0.1, 0.0]).normalized().unwrap();
        let results = index.search(&query, 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[1].id, 2);
        assert_relative_eq!(results[0].score, 0.9939, epsilon = 1e-3);
        assert_relative_eq!(results[1].score, 0.1104, epsilon = 1e-3);
    }

    #[test]
    fn test_search_empty_index() {
        let index = SimilarityIndex::in_memory(3);
        let results = index.search(&v(&[1.0, 0.0, 0.0]), 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_top_k_zero() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 1).unwrap();
        assert!(index.search(&v(&[1.0, 0.0]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = SimilarityIndex::in_memory(3);
        assert!(matches!(
            index.search(&v(&[1.0, 0.0]), 1),
            Err(NotesError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_index_unchanged() {
        let mut index = SimilarityIndex::in_memory(3);
        index.add(&v(&[1.0, 0.0, 0.0]), 1).unwrap();

        let result = index.add(&v(&[1.0, 0.0]), 2);
        assert!(matches!(result, Err(NotesError::DimensionMismatch { .. })));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_add_duplicate_identifier() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 7).unwrap();

        let result = index.add(&v(&[0.0, 1.0]), 7);
        assert!(matches!(
            result,
            Err(NotesError::DuplicateIdentifier { id: 7 })
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(7), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[0.0, 1.0]), 30).unwrap();
        index.add(&v(&[1.0, 0.0]), 20).unwrap();
        index.add(&v(&[1.0, 0.0]), 10).unwrap();

        let results = index.search(&v(&[1.0, 0.0]), 3).unwrap();
        let ids: Vec<NoteId> = results.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![20, 10, 30]);
    }

    #[test]
    fn test_replace_changes_ranking() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 5).unwrap();
        index.add(&v(&[0.6, 0.8]), 6).unwrap();

        assert!(index.replace(5, &v(&[0.0, 1.0])).unwrap());

        let results = index.search(&v(&[0.0, 1.0]), 2).unwrap();
        assert_eq!(results[0].id, 5);
        assert_relative_eq!(results[0].score, 1.0, epsilon = 1e-6);
        assert_eq!(index.ids(), &[5, 6]);
    }

    #[test]
    fn test_replace_missing_returns_false() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 5).unwrap();

        assert!(!index.replace(99, &v(&[0.0, 1.0])).unwrap());
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(5), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_replace_dimension_mismatch() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 5).unwrap();

        assert!(index.replace(5, &v(&[1.0, 0.0, 0.0])).is_err());
        assert_eq!(index.get(5), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_remove_twice() {
        let mut index = SimilarityIndex::in_memory(2);
        index.add(&v(&[1.0, 0.0]), 1).unwrap();
        index.add(&v(&[0.0, 1.0]), 2).unwrap();
        index.add(&v(&[0.6, 0.8]), 3).unwrap();

        assert!(index.remove(2).unwrap());
        assert_eq!(index.ids(), &[1, 3]);
        assert_eq!(index.get(3), Some(&[0.6, 0.8][..]));

        assert!(!index.remove(2).unwrap());
        assert_eq!(index.ids(), &[1, 3]);
        assert_eq!(index.get(1), Some(&[1.0, 0.0][..]));
        assert_eq!(index.get(3), Some(&[0.6, 0.8][..]));
    }

    #[test]
    fn test_open_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");

        {
            let mut index = SimilarityIndex::open(&path, 2).unwrap();
            index.add(&v(&[1.0, 0.0]), 11).unwrap();
            index.add(&v(&[0.0, 1.0]), 12).unwrap();
            index.add(&v(&[0.6, 0.8]), 13).unwrap();
            index.remove(12).unwrap();
            index.replace(11, &v(&[0.8, 0.6])).unwrap();
        }

        let index = SimilarityIndex::open(&path, 2).unwrap();
        assert_eq!(index.ids(), &[11, 13]);
        assert_eq!(index.get(11), Some(&[0.8, 0.6][..]));
        assert_eq!(index.get(13), Some(&[0.6, 0.8][..]));
    }

    #[test]
    fn test_open_with_different_dimension() {
        let dir = TempDir::new().unwrap();
        {
            let mut index = SimilarityIndex::open(dir.path(), 2).unwrap();
            index.add(&v(&[1.0, 0.0]), 1).unwrap();
        }

        assert!(matches!(
            SimilarityIndex::open(dir.path(), 3),
            Err(NotesError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let mut index = SimilarityIndex::open(&path, 2).unwrap();
        index.add(&v(&[1.0, 0.0]), 1).unwrap();

        // A directory squatting on the temp path makes the staged write fail.
        std::fs::create_dir(path.join("embeddings.npy.tmp")).unwrap();

        assert!(matches!(
            index.add(&v(&[0.0, 1.0]), 2),
            Err(NotesError::PersistenceFailure { .. })
        ));
        assert_eq!(index.ids(), &[1]);

        assert!(index.replace(1, &v(&[0.0, 1.0])).is_err());
        assert_eq!(index.get(1), Some(&[1.0, 0.0][..]));

        assert!(index.remove(1).is_err());
        assert_eq!(index.ids(), &[1]);
        assert_eq!(index.get(1), Some(&[1.0, 0.0][..]));
    }
}
