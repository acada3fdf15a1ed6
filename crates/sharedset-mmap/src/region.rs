//! Backing stores for a [`MemoryMap`](crate::MemoryMap).

use crate::error::Result;

/// Contiguous, growable bytes that a region lives in.
///
/// The base address of the bytes may change on every [`grow`](Region::grow) or
/// [`refresh`](Region::refresh); nothing above this trait holds on to it.
pub trait Region: Send {
    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    /// Extend the backing store to `new_len` bytes. New bytes read as zero.
    fn grow(&mut self, new_len: usize) -> Result<()>;

    /// Pick up growth performed by another attacher so that at least `len`
    /// bytes are addressable.
    fn refresh(&mut self, len: usize) -> Result<()> {
        if len > self.bytes().len() {
            self.grow(len)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-private region on the heap.
#[derive(Debug, Default)]
pub struct HeapRegion {
    buf: Vec<u8>,
}

impl HeapRegion {
    pub fn new(len: usize) -> Self {
        Self { buf: vec![0; len] }
    }
}

impl Region for HeapRegion {
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn grow(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.buf.len() {
            self.buf.resize(new_len, 0);
        }
        Ok(())
    }
}

#[cfg(feature = "mmap")]
pub use file::FileRegion;

#[cfg(feature = "mmap")]
mod file {
    use super::Region;
    use crate::error::{MapError, Result};
    use memmap2::{MmapMut, MmapOptions};
    use std::fs::{File, OpenOptions};
    use std::path::{Path, PathBuf};

    /// Region backed by a shared file mapping.
    ///
    /// Every process that maps the same file sees the same bytes, each at its own
    /// base address.
    pub struct FileRegion {
        mmap: MmapMut,
        file: File,
        path: PathBuf,
    }

    impl FileRegion {
        /// Create (or truncate) `path` and map `len` zeroed bytes.
        pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self> {
            let path = path.as_ref().to_path_buf();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| MapError::Create {
                    path: path.clone(),
                    cause: e.to_string(),
                })?;
            file.set_len(len as u64).map_err(|e| MapError::Create {
                path: path.clone(),
                cause: e.to_string(),
            })?;
            let mmap = map_file(&file, &path, len)?;
            Ok(Self { mmap, file, path })
        }

        /// Map an existing region file in full.
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref().to_path_buf();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| MapError::Create {
                    path: path.clone(),
                    cause: e.to_string(),
                })?;
            let len = file.metadata()?.len() as usize;
            let mmap = map_file(&file, &path, len)?;
            Ok(Self { mmap, file, path })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    fn map_file(file: &File, path: &Path, len: usize) -> Result<MmapMut> {
        // SAFETY: the mapping is shared by design; all access goes through
        // bounds-checked slices and concurrent mutation is excluded by the host.
        unsafe { MmapOptions::new().len(len).map_mut(file) }.map_err(|e| MapError::Mmap {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })
    }

    impl Region for FileRegion {
        fn bytes(&self) -> &[u8] {
            &self.mmap
        }

        fn bytes_mut(&mut self) -> &mut [u8] {
            &mut self.mmap
        }

        fn grow(&mut self, new_len: usize) -> Result<()> {
            let on_disk = self.file.metadata()?.len() as usize;
            if new_len > on_disk {
                self.file
                    .set_len(new_len as u64)
                    .map_err(|e| MapError::Create {
                        path: self.path.clone(),
                        cause: e.to_string(),
                    })?;
            }
            if new_len > self.mmap.len() {
                self.mmap = map_file(&self.file, &self.path, new_len)?;
            }
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.mmap.flush()?;
            Ok(())
        }
    }

    impl std::fmt::Debug for FileRegion {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FileRegion")
                .field("path", &self.path)
                .field("len", &self.mmap.len())
                .finish()
        }
    }
}
