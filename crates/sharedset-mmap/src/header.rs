//! Region header.
//!
//! The first [`HEADER_SIZE`] bytes of every region. It is the only shared
//! allocator state: the allocation cursor and mapped extent live here so that
//! any attacher can see (and continue) what another one allocated.

use crate::error::{MapError, Result};
use crate::record::{FieldReader, FieldWriter, Record};

/// "SHRDSET\0" in little-endian byte order.
pub const MAP_MAGIC: u64 = 0x0054_4553_4452_4853;

pub const MAP_VERSION: u32 = 1;

pub const HEADER_SIZE: usize = 64;

/// Every allocation starts on this boundary.
pub const ALIGNMENT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub magic: u64,
    pub version: u32,
    pub flags: u32,
    /// Bytes currently backing the region (its mapped extent).
    pub size: u64,
    /// Allocation cursor; everything below it is in use.
    pub used: u64,
    /// Offset of the root structure, `0` until one is stored.
    pub root: u64,
}

impl MapHeader {
    pub fn new(size: u64) -> Self {
        Self {
            magic: MAP_MAGIC,
            version: MAP_VERSION,
            flags: 0,
            size,
            used: HEADER_SIZE as u64,
            root: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != MAP_MAGIC {
            return Err(MapError::Corrupt {
                offset: 0,
                cause: format!("bad magic {:#x}", self.magic),
            });
        }
        if self.version != MAP_VERSION {
            return Err(MapError::Corrupt {
                offset: 0,
                cause: format!("unsupported version {}", self.version),
            });
        }
        if self.used > self.size || self.used < HEADER_SIZE as u64 {
            return Err(MapError::Corrupt {
                offset: 0,
                cause: format!(
                    "allocation cursor {} outside region of {} bytes",
                    self.used, self.size
                ),
            });
        }
        Ok(())
    }
}

impl Record for MapHeader {
    const SIZE: usize = HEADER_SIZE;

    fn decode(buf: &[u8]) -> Self {
        let mut r = FieldReader::new(buf);
        let magic = r.read();
        let version = r.read();
        let flags = r.read();
        let size = r.read();
        let used = r.read();
        let root = r.read();
        Self {
            magic,
            version,
            flags,
            size,
            used,
            root,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        w.write(&self.magic);
        w.write(&self.version);
        w.write(&self.flags);
        w.write(&self.size);
        w.write(&self.used);
        w.write(&self.root);
        // reserved
        w.pad(HEADER_SIZE - w.position());
    }
}

/// Round `n` up to the allocation boundary.
pub(crate) const fn align_up(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}
