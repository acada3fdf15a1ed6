//! Position-independent storage for data shared between processes.
//!
//! A [`MemoryMap`] is a growable region (heap memory, or a shared file mapping
//! with the `mmap` feature) plus a bump allocator. Structures inside the region
//! refer to each other only through [`Ref<T>`], an offset from the region's
//! start, and are read and written through the fixed-layout [`Record`] codec.
//! Two processes mapping the same file at different addresses therefore see the
//! same structures.
//!
//! ```
//! use sharedset_mmap::{MapOptions, MemoryMap};
//!
//! let mut mm = MemoryMap::in_memory(MapOptions::default()).unwrap();
//! let values = mm.allocate_base::<i32>(4).unwrap();
//! mm.resolve_mut(values).set_at(2, &10);
//! assert_eq!(mm.resolve(values).get_at(2), 10);
//! ```

pub mod error;
pub mod header;
pub mod map;
pub mod record;
pub mod reference;
pub mod region;

pub use error::{MapError, Result};
pub use map::{MapOptions, MemoryMap, Resolved, ResolvedMut};
pub use record::{FieldReader, FieldWriter, Record};
pub use reference::Ref;
#[cfg(feature = "mmap")]
pub use region::FileRegion;
pub use region::{HeapRegion, Region};
