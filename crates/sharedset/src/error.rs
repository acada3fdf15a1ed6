//! Errors surfaced by dataset reads and edits.

use std::fmt;

use sharedset_common::StorageKind;
use sharedset_mmap::MapError;
use thiserror::Error;

/// How a missing column was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    Name(String),
    Id(i32),
    Index(usize),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => write!(f, "'{name}'"),
            ColumnKey::Id(id) => write!(f, "id {id}"),
            ColumnKey::Index(index) => write!(f, "index {index}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no such column: {key}")]
    ColumnNotFound { key: ColumnKey },

    #[error("level {key} not found in {column}")]
    LevelNotFound { key: String, column: String },

    #[error("level {value} already exists in {column}")]
    DuplicateLevel { value: i32, column: String },

    #[error("too many columns: all {capacity} column slots are in use")]
    CapacityExceeded { capacity: usize },

    /// A cell was read or written as a type the column does not store.
    #[error("column {column} stores {expected} cells, not {found}")]
    WrongStorage {
        column: String,
        expected: StorageKind,
        found: StorageKind,
    },

    #[error("index {index} out of bounds for {count} entries")]
    OutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Map(#[from] MapError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ColumnNotFound { .. } | StoreError::LevelNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
