//! Error types for region management.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while creating, attaching to or growing a region.
#[derive(Error, Debug)]
pub enum MapError {
    /// The backing file could not be created, opened or resized.
    #[error("failed to create region at {path}: {cause}")]
    Create { path: PathBuf, cause: String },

    /// The backing file could not be mapped.
    #[error("failed to map region at {path}: {cause}")]
    Mmap { path: PathBuf, cause: String },

    /// The region header is unreadable or from another format version.
    #[error("region corrupted at offset {offset}: {cause}")]
    Corrupt { offset: u64, cause: String },

    /// Growing the region would exceed its configured maximum size.
    #[error("region exhausted: requested {requested} bytes with {used} of {limit} bytes in use")]
    Exhausted {
        requested: u64,
        used: u64,
        limit: u64,
    },

    /// The region was attached to before any root structure was stored.
    #[error("region has no root structure")]
    NoRoot,

    #[error("region I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
