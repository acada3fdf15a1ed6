//! Typed row cells.

use sharedset_common::{MISSING_DECIMAL, MISSING_INT, StorageKind};
use sharedset_mmap::{MemoryMap, Record, Ref};

use crate::layout::{Block, ColumnRecord, ROWS_PER_BLOCK};

/// A value that can occupy one row of a column's blocks.
///
/// Implemented for the three storage kinds: `i32` (integers and factor codes),
/// `f64` (decimals) and `Ref<str>` (identifier text).
pub trait Cell: Record + Copy {
    const KIND: StorageKind;

    fn missing() -> Self;

    fn is_missing(&self) -> bool;
}

impl Cell for i32 {
    const KIND: StorageKind = StorageKind::Integer;

    fn missing() -> Self {
        MISSING_INT
    }

    fn is_missing(&self) -> bool {
        *self == MISSING_INT
    }
}

impl Cell for f64 {
    const KIND: StorageKind = StorageKind::Decimal;

    fn missing() -> Self {
        MISSING_DECIMAL
    }

    fn is_missing(&self) -> bool {
        self.is_nan()
    }
}

impl Cell for Ref<str> {
    const KIND: StorageKind = StorageKind::Text;

    fn missing() -> Self {
        Ref::NULL
    }

    fn is_missing(&self) -> bool {
        self.is_null()
    }
}

/// Location of `row` in the column described by `s`. The row must lie within
/// the column's allocated blocks.
#[inline]
pub(crate) fn cell_ref<T: Cell>(mm: &MemoryMap, s: &ColumnRecord, row: usize) -> Ref<T> {
    let block: Ref<Block> = mm.resolve(s.blocks).get_at(row / ROWS_PER_BLOCK);
    block
        .cast::<T>()
        .byte_add(((row % ROWS_PER_BLOCK) * T::SIZE) as u64)
}

#[inline]
pub(crate) fn read_cell<T: Cell>(mm: &MemoryMap, s: &ColumnRecord, row: usize) -> T {
    mm.resolve(cell_ref::<T>(mm, s, row)).get()
}

#[inline]
pub(crate) fn write_cell<T: Cell>(mm: &mut MemoryMap, s: &ColumnRecord, row: usize, value: T) {
    let at = cell_ref::<T>(mm, s, row);
    mm.resolve_mut(at).set(&value);
}
