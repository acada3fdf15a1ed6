//! Fixtures shared by the sharedset test suites.

use std::path::{Path, PathBuf};

use sharedset_mmap::{MapOptions, MemoryMap};
use tempfile::TempDir;

/// Initial size used by [`small_map`] and [`TempRegion::create_small`]; small
/// enough that any real workload exercises region growth.
pub const SMALL_REGION: usize = 4096;

/// A heap-backed map that starts tiny.
pub fn small_map() -> MemoryMap {
    MemoryMap::in_memory(MapOptions::default().with_initial_size(SMALL_REGION))
        .expect("in-memory region")
}

/// Route `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A region file in a temporary directory that is removed on drop.
pub struct TempRegion {
    _dir: TempDir,
    path: PathBuf,
}

impl TempRegion {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dataset.region");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the region file and map it.
    pub fn create(&self, options: MapOptions) -> MemoryMap {
        MemoryMap::create(&self.path, options).expect("create region")
    }

    pub fn create_small(&self) -> MemoryMap {
        self.create(MapOptions::default().with_initial_size(SMALL_REGION))
    }

    /// Map the region file again, as a second process would.
    pub fn open(&self) -> MemoryMap {
        MemoryMap::open(&self.path).expect("open region")
    }
}

impl Default for TempRegion {
    fn default() -> Self {
        Self::new()
    }
}
