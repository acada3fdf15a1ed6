//! Relative references into a mapped region.

use std::fmt;
use std::marker::PhantomData;

/// Offset from the start of a region, tagged with the type stored there.
///
/// A `Ref<T>` never holds an address. It is resolved against whatever base the
/// current process mapped the region at (see [`MemoryMap::resolve`]), so it stays
/// valid across growth, remapping and process boundaries.
///
/// Offset `0` is the region header and is never handed out by the allocator, which
/// makes it usable as the null reference.
///
/// [`MemoryMap::resolve`]: crate::MemoryMap::resolve
#[repr(transparent)]
pub struct Ref<T: ?Sized> {
    offset: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Ref<T> {
    pub const NULL: Self = Self::from_offset(0);

    #[must_use]
    pub const fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::NULL
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.offset == 0
    }

    /// Reinterpret the referenced bytes as another type.
    #[must_use]
    pub const fn cast<U: ?Sized>(self) -> Ref<U> {
        Ref::from_offset(self.offset)
    }

    /// Reference `bytes` past this one, keeping the type tag.
    #[must_use]
    pub const fn byte_add(self, bytes: u64) -> Self {
        Self::from_offset(self.offset + bytes)
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Ref<T> {}

impl<T: ?Sized> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T: ?Sized> Eq for Ref<T> {}

impl<T: ?Sized> std::hash::Hash for Ref<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
    }
}

impl<T: ?Sized> Default for Ref<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T: ?Sized> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Ref(null)")
        } else {
            write!(f, "Ref(0x{:08x})", self.offset)
        }
    }
}

impl<T: ?Sized> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.offset)
    }
}
