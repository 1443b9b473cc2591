//! On-disk format and crash recovery of the similarity index

use std::fs;

use semantic_notes::persistence::npy;
use semantic_notes::{NotesError, SimilarityIndex, Vector};
use tempfile::TempDir;

#[test]
fn test_files_written_after_every_mutation() {
    let dir = TempDir::new().unwrap();
    let mut index = SimilarityIndex::open(dir.path(), 2).unwrap();

    index.add(&Vector::new(vec![1.0, 0.0]), 1).unwrap();
    index.add(&Vector::new(vec![0.0, 1.0]), 2).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("map.json")).unwrap(), "[1,2]");

    index.remove(1).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("map.json")).unwrap(), "[2]");

    let matrix = npy::decode(&fs::read(dir.path().join("embeddings.npy")).unwrap()).unwrap();
    assert_eq!((matrix.rows, matrix.cols), (1, 2));
    assert_eq!(matrix.data, vec![0.0, 1.0]);
}

#[test]
fn test_emptied_index_keeps_dimension() {
    let dir = TempDir::new().unwrap();
    {
        let mut index = SimilarityIndex::open(dir.path(), 4).unwrap();
        index.add(&Vector::new(vec![0.5; 4]), 9).unwrap();
        index.remove(9).unwrap();
    }

    let index = SimilarityIndex::open(dir.path(), 4).unwrap();
    assert!(index.is_empty());
    assert!(matches!(
        SimilarityIndex::open(dir.path(), 8),
        Err(NotesError::DimensionMismatch {
            expected: 8,
            actual: 4
        })
    ));
}

#[test]
fn test_loads_externally_written_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("embeddings.npy"),
        npy::encode(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
    )
    .unwrap();
    fs::write(dir.path().join("map.json"), "[12, 40]").unwrap();

    let index = SimilarityIndex::open(dir.path(), 3).unwrap();
    assert_eq!(index.ids(), &[12, 40]);

    let hits = index.search(&Vector::new(vec![0.0, 0.0, 1.0]), 1).unwrap();
    assert_eq!(hits[0].id, 40);
}

#[test]
fn test_row_count_mismatch_fails_fast() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("embeddings.npy"),
        npy::encode(2, 1, &[1.0, 1.0]),
    )
    .unwrap();
    fs::write(dir.path().join("map.json"), "[1, 2, 3]").unwrap();

    assert!(matches!(
        SimilarityIndex::open(dir.path(), 1),
        Err(NotesError::CorruptIndex { .. })
    ));
}

#[test]
fn test_truncated_vector_file_fails_fast() {
    let dir = TempDir::new().unwrap();
    {
        let mut index = SimilarityIndex::open(dir.path(), 2).unwrap();
        index.add(&Vector::new(vec![1.0, 0.0]), 1).unwrap();
    }
    let path = dir.path().join("embeddings.npy");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

    assert!(matches!(
        SimilarityIndex::open(dir.path(), 2),
        Err(NotesError::CorruptIndex { .. })
    ));
}

#[test]
fn test_crash_before_commit_restores_previous_state() {
    let dir = TempDir::new().unwrap();
    {
        let mut index = SimilarityIndex::open(dir.path(), 2).unwrap();
        index.add(&Vector::new(vec![1.0, 0.0]), 1).unwrap();
    }

    // A save of [1, 2] that died before renaming anything.
    fs::write(
        dir.path().join("embeddings.npy.tmp"),
        npy::encode(2, 2, &[1.0, 0.0, 0.0, 1.0]),
    )
    .unwrap();
    fs::write(dir.path().join("map.json.tmp"), "[1,2]").unwrap();

    let index = SimilarityIndex::open(dir.path(), 2).unwrap();
    assert_eq!(index.ids(), &[1]);
    assert!(!dir.path().join("embeddings.npy.tmp").exists());
    assert!(!dir.path().join("map.json.tmp").exists());
}

#[test]
fn test_crash_after_commit_rolls_forward() {
    let dir = TempDir::new().unwrap();
    {
        let mut index = SimilarityIndex::open(dir.path(), 2).unwrap();
        index.add(&Vector::new(vec![1.0, 0.0]), 1).unwrap();
        index.add(&Vector::new(vec![0.0, 1.0]), 2).unwrap();
    }

    // A save of [2] (delete of 1) that died after the vector rename.
    fs::write(
        dir.path().join("embeddings.npy"),
        npy::encode(1, 2, &[0.0, 1.0]),
    )
    .unwrap();
    fs::write(dir.path().join("map.json.tmp"), "[2]").unwrap();

    let index = SimilarityIndex::open(dir.path(), 2).unwrap();
    assert_eq!(index.ids(), &[2]);
    assert_eq!(index.get(2), Some(&[0.0, 1.0][..]));
}
