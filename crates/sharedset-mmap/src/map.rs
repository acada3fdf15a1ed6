//! The memory map: allocator and resolver over a [`Region`].

use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MapError, Result};
use crate::header::{HEADER_SIZE, MapHeader, align_up};
use crate::record::Record;
use crate::region::{HeapRegion, Region};
use crate::Ref;

/// Sizing for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapOptions {
    /// Bytes mapped at creation.
    pub initial_size: usize,
    /// Growth beyond this is refused with [`MapError::Exhausted`].
    pub max_size: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            initial_size: 1024 * 1024,
            max_size: 4 * 1024 * 1024 * 1024,
        }
    }
}

impl MapOptions {
    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size.max(HEADER_SIZE);
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

/// A growable region with a bump allocator that only ever hands out relative
/// references.
///
/// Access handles ([`Resolved`], [`ResolvedMut`]) borrow the map, so the borrow
/// checker enforces that none of them survives a call that may grow (and
/// therefore move) the region.
pub struct MemoryMap {
    region: Box<dyn Region>,
    options: MapOptions,
}

impl MemoryMap {
    /// A process-private region on the heap.
    pub fn in_memory(options: MapOptions) -> Result<Self> {
        let len = align_up(options.initial_size.max(HEADER_SIZE));
        Self::initialise(Box::new(HeapRegion::new(len)), options)
    }

    /// Create a shareable region backed by the file at `path`.
    #[cfg(feature = "mmap")]
    pub fn create(path: impl AsRef<std::path::Path>, options: MapOptions) -> Result<Self> {
        let len = align_up(options.initial_size.max(HEADER_SIZE));
        let region = crate::region::FileRegion::create(path, len)?;
        Self::initialise(Box::new(region), options)
    }

    /// Attach to a region file another map created.
    #[cfg(feature = "mmap")]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let region = crate::region::FileRegion::open(path)?;
        Self::attach(Box::new(region), MapOptions::default())
    }

    /// Wrap a custom backing store that already holds a region.
    pub fn attach(mut region: Box<dyn Region>, options: MapOptions) -> Result<Self> {
        if region.bytes().len() < HEADER_SIZE {
            return Err(MapError::Corrupt {
                offset: 0,
                cause: format!("region of {} bytes has no header", region.bytes().len()),
            });
        }
        let header = MapHeader::decode(region.bytes());
        header.validate()?;
        region.refresh(header.size as usize)?;
        Ok(Self { region, options })
    }

    fn initialise(mut region: Box<dyn Region>, options: MapOptions) -> Result<Self> {
        let header = MapHeader::new(region.bytes().len() as u64);
        header.encode(region.bytes_mut());
        Ok(Self { region, options })
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    fn header(&self) -> MapHeader {
        MapHeader::decode(self.region.bytes())
    }

    fn set_header(&mut self, header: &MapHeader) {
        header.encode(self.region.bytes_mut());
    }

    /// Bytes currently backing the region.
    pub fn size(&self) -> usize {
        self.header().size as usize
    }

    /// Bytes handed out so far, header included.
    pub fn used(&self) -> usize {
        self.header().used as usize
    }

    /// Re-synchronise with growth performed through another mapping of the same
    /// region. Handles resolved before the call must be re-resolved after it.
    pub fn sync(&mut self) -> Result<()> {
        let size = self.header().size as usize;
        if size > self.region.bytes().len() {
            #[cfg(feature = "tracing")]
            tracing::debug!(from = self.region.bytes().len(), to = size, "remapping region");
            self.region.refresh(size)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.region.flush()
    }

    fn reserve_bytes(&mut self, bytes: usize) -> Result<u64> {
        self.sync()?;
        let mut header = self.header();
        let aligned = align_up(bytes.max(1)) as u64;
        let needed = header.used + aligned;

        if needed > header.size {
            let limit = self.options.max_size as u64;
            if needed > limit {
                return Err(MapError::Exhausted {
                    requested: aligned,
                    used: header.used,
                    limit,
                });
            }
            let mut new_size = header.size.max(HEADER_SIZE as u64);
            while new_size < needed {
                new_size = new_size.saturating_mul(2);
            }
            let new_size = align_up(new_size.min(limit) as usize);
            #[cfg(feature = "tracing")]
            tracing::debug!(from = header.size, to = new_size, "growing region");
            self.region.grow(new_size)?;
            header.size = new_size as u64;
        }

        let offset = header.used;
        header.used = needed;
        // bytes past the cursor have never been written, so they are still zero
        self.set_header(&header);
        Ok(offset)
    }

    /// Reserve `n` contiguous zeroed `T` and return a handle for initialising
    /// them. Use [`ResolvedMut::base`] to obtain the reference to store.
    pub fn allocate<T: Record>(&mut self, n: usize) -> Result<ResolvedMut<'_, T>> {
        let r = self.allocate_base::<T>(n)?;
        Ok(self.resolve_mut(r))
    }

    /// Reserve `n` contiguous zeroed `T` and return the relative reference
    /// directly, ready to be stored in another structure.
    pub fn allocate_base<T: Record>(&mut self, n: usize) -> Result<Ref<T>> {
        let bytes = T::SIZE.checked_mul(n).ok_or(MapError::Exhausted {
            requested: u64::MAX,
            used: self.used() as u64,
            limit: self.options.max_size as u64,
        })?;
        let offset = self.reserve_bytes(bytes)?;
        Ok(Ref::from_offset(offset))
    }

    /// Copy `s` into the region as a length-prefixed string.
    pub fn allocate_str(&mut self, s: &str) -> Result<Ref<str>> {
        let offset = self.reserve_bytes(4 + s.len())? as usize;
        let bytes = self.region.bytes_mut();
        LittleEndian::write_u32(&mut bytes[offset..], s.len() as u32);
        bytes[offset + 4..offset + 4 + s.len()].copy_from_slice(s.as_bytes());
        Ok(Ref::from_offset(offset as u64))
    }

    /// Resolve `r` for reading against this process's mapping.
    ///
    /// # Panics
    ///
    /// Accessing through the handle panics if the reference lies outside the
    /// mapped bytes, which means the reference is corrupt or this mapping is
    /// stale (see [`MemoryMap::sync`]).
    pub fn resolve<T: Record>(&self, r: Ref<T>) -> Resolved<'_, T> {
        Resolved {
            bytes: self.region.bytes(),
            at: r,
        }
    }

    /// Resolve `r` for reading and writing.
    pub fn resolve_mut<T: Record>(&mut self, r: Ref<T>) -> ResolvedMut<'_, T> {
        ResolvedMut {
            bytes: self.region.bytes_mut(),
            at: r,
        }
    }

    /// The string stored at `r`; the null reference reads as `""`.
    pub fn resolve_str(&self, r: Ref<str>) -> &str {
        if r.is_null() {
            return "";
        }
        let bytes = self.region.bytes();
        let start = r.offset() as usize;
        let len = LittleEndian::read_u32(&bytes[start..]) as usize;
        std::str::from_utf8(&bytes[start + 4..start + 4 + len]).unwrap_or_default()
    }

    /// Convert a handle back into the reference it was resolved from.
    pub fn base<T: Record>(&self, handle: &Resolved<'_, T>) -> Ref<T> {
        handle.base()
    }

    /// The region's well-known root structure.
    pub fn root<T: Record>(&self) -> Result<Ref<T>> {
        match self.header().root {
            0 => Err(MapError::NoRoot),
            offset => Ok(Ref::from_offset(offset)),
        }
    }

    pub fn set_root<T: Record>(&mut self, r: Ref<T>) {
        let mut header = self.header();
        header.root = r.offset();
        self.set_header(&header);
    }
}

impl std::fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = self.header();
        f.debug_struct("MemoryMap")
            .field("size", &h.size)
            .field("used", &h.used)
            .field("root", &h.root)
            .finish()
    }
}

/// Read handle for one or more `T` starting at a reference.
pub struct Resolved<'a, T> {
    bytes: &'a [u8],
    at: Ref<T>,
}

impl<'a, T: Record> Resolved<'a, T> {
    #[inline]
    fn span(&self, index: usize) -> Range<usize> {
        let start = self.at.offset() as usize + index * T::SIZE;
        start..start + T::SIZE
    }

    #[inline]
    pub fn get(&self) -> T {
        self.get_at(0)
    }

    #[inline]
    pub fn get_at(&self, index: usize) -> T {
        T::decode(&self.bytes[self.span(index)])
    }

    pub fn base(&self) -> Ref<T> {
        self.at
    }
}

/// Read/write handle for one or more `T` starting at a reference.
pub struct ResolvedMut<'a, T> {
    bytes: &'a mut [u8],
    at: Ref<T>,
}

impl<'a, T: Record> ResolvedMut<'a, T> {
    #[inline]
    fn span(&self, index: usize) -> Range<usize> {
        let start = self.at.offset() as usize + index * T::SIZE;
        start..start + T::SIZE
    }

    #[inline]
    pub fn get(&self) -> T {
        self.get_at(0)
    }

    #[inline]
    pub fn get_at(&self, index: usize) -> T {
        T::decode(&self.bytes[self.span(index)])
    }

    #[inline]
    pub fn set(&mut self, value: &T) {
        self.set_at(0, value)
    }

    #[inline]
    pub fn set_at(&mut self, index: usize, value: &T) {
        let span = self.span(index);
        value.encode(&mut self.bytes[span]);
    }

    /// Read-modify-write the first element.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value = self.get();
        let out = f(&mut value);
        self.set(&value);
        out
    }

    /// Element-wise `memmove` of `src` to start at `dest`.
    pub fn copy_within(&mut self, src: Range<usize>, dest: usize) {
        let base = self.at.offset() as usize;
        let from = base + src.start * T::SIZE..base + src.end * T::SIZE;
        self.bytes.copy_within(from, base + dest * T::SIZE);
    }

    /// Write `value` to every element in `range`.
    pub fn fill(&mut self, range: Range<usize>, value: &T) {
        for i in range {
            self.set_at(i, value);
        }
    }

    pub fn base(&self) -> Ref<T> {
        self.at
    }
}
