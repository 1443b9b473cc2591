//! Persistence layer: NPY matrix codec and the two-file index image.

pub mod files;
pub mod npy;

pub use files::{IndexFiles, PersistedIndex};
