//! Read access to one column.

use std::fmt;
use std::iter::FusedIterator;

use sharedset_common::{
    CellValue, ColumnType, DataType, LevelData, LevelKey, MISSING_INT, MeasureType, StorageKind,
};
use sharedset_mmap::{MemoryMap, Ref};

use crate::cell::{Cell, read_cell};
use crate::error::{Result, StoreError};
use crate::layout::{ColumnRecord, LevelRecord};

/// The read contract shared by [`Column`] and [`ColumnW`](crate::ColumnW).
///
/// Every accessor resolves the column record afresh, so a value read here is
/// never stale with respect to edits made through the same map.
pub trait ColumnRead {
    fn memory(&self) -> &MemoryMap;

    /// The column record's location in the region.
    fn rel(&self) -> Ref<ColumnRecord>;

    fn record(&self) -> ColumnRecord {
        self.memory().resolve(self.rel()).get()
    }

    fn id(&self) -> i32 {
        self.record().id
    }

    fn name(&self) -> &str {
        self.memory().resolve_str(self.record().name)
    }

    fn import_name(&self) -> &str {
        self.memory().resolve_str(self.record().import_name)
    }

    fn column_type(&self) -> ColumnType {
        self.record().column_type
    }

    fn data_type(&self) -> DataType {
        self.record().data_type
    }

    fn measure_type(&self) -> MeasureType {
        self.record().measure_type
    }

    fn auto_measure(&self) -> bool {
        self.record().auto_measure
    }

    /// Decimal places to display.
    fn dps(&self) -> u8 {
        self.record().dps
    }

    fn active(&self) -> bool {
        self.record().active
    }

    fn trim_levels(&self) -> bool {
        self.record().trim_levels
    }

    fn changes(&self) -> u32 {
        self.record().changes
    }

    /// Formula of a computed column; `None` when never set.
    fn formula(&self) -> Option<&str> {
        let r = self.record().formula;
        (!r.is_null()).then(|| self.memory().resolve_str(r))
    }

    fn formula_message(&self) -> Option<&str> {
        let r = self.record().formula_message;
        (!r.is_null()).then(|| self.memory().resolve_str(r))
    }

    fn row_count(&self) -> usize {
        self.record().row_count as usize
    }

    fn storage_kind(&self) -> StorageKind {
        let s = self.record();
        StorageKind::of(s.data_type, s.measure_type)
    }

    /// The cell at `row` as stored. Fails with [`StoreError::WrongStorage`]
    /// unless `T` matches the column's [`storage_kind`](ColumnRead::storage_kind).
    fn raw<T: Cell>(&self, row: usize) -> Result<T> {
        let s = self.record();
        if row >= s.row_count as usize {
            return Err(StoreError::OutOfRange {
                index: row,
                count: s.row_count as usize,
            });
        }
        check_storage::<T, _>(self, &s)?;
        Ok(read_cell(self.memory(), &s, row))
    }

    /// The cell at `row`, typed by the column's storage kind.
    fn value(&self, row: usize) -> Result<CellValue<'_>> {
        Ok(match self.storage_kind() {
            StorageKind::Integer => CellValue::from_int(self.raw::<i32>(row)?),
            StorageKind::Decimal => CellValue::from_decimal(self.raw::<f64>(row)?),
            StorageKind::Text => {
                CellValue::from_text(self.memory().resolve_str(self.raw::<Ref<str>>(row)?))
            }
        })
    }

    /// Levels in dictionary order.
    fn levels(&self) -> Levels<'_> {
        Levels::new(self.memory(), &self.record())
    }

    fn level_count(&self) -> usize {
        self.record().levels_used as usize
    }

    /// Levels used by at least one row the active filter keeps.
    fn level_count_ex_filtered(&self) -> usize {
        level_records(self.memory(), self.record())
            .filter(|l| l.count_ex_filtered > 0)
            .count()
    }

    fn has_levels(&self) -> bool {
        self.record().measure_type.has_levels()
    }

    fn has_unused_levels(&self) -> bool {
        level_records(self.memory(), self.record()).any(|l| l.count_ex_filtered == 0)
    }

    fn try_label(&self, value: i32) -> Option<&str> {
        let mm = self.memory();
        if value == MISSING_INT {
            return Some("");
        }
        level_records(mm, self.record())
            .find(|l| l.value == value)
            .map(|l| mm.resolve_str(l.label))
    }

    /// Label of the level with integer `value`. The missing value has the
    /// empty label.
    fn label_for_value(&self, value: i32) -> Result<&str> {
        self.try_label(value)
            .ok_or_else(|| level_not_found(self, value.to_string()))
    }

    /// Label of the level imported as `import_value`. The empty string is
    /// returned unchanged.
    fn label_for_import<'s>(&'s self, import_value: &'s str) -> Result<&'s str> {
        if import_value.is_empty() {
            return Ok(import_value);
        }
        let mm = self.memory();
        level_records(mm, self.record())
            .find(|l| mm.resolve_str(l.import_value) == import_value)
            .map(|l| mm.resolve_str(l.label))
            .ok_or_else(|| level_not_found(self, import_value.to_owned()))
    }

    fn import_value(&self, value: i32) -> Result<&str> {
        if value == MISSING_INT {
            return Ok("");
        }
        let mm = self.memory();
        level_records(mm, self.record())
            .find(|l| l.value == value)
            .map(|l| mm.resolve_str(l.import_value))
            .ok_or_else(|| level_not_found(self, value.to_string()))
    }

    /// Value of the level whose label or import value is `label`.
    fn try_value_for_label(&self, label: &str) -> Option<i32> {
        let mm = self.memory();
        level_records(mm, self.record())
            .find(|l| mm.resolve_str(l.label) == label || mm.resolve_str(l.import_value) == label)
            .map(|l| l.value)
    }

    fn value_for_label(&self, label: &str) -> Result<i32> {
        self.try_value_for_label(label)
            .ok_or_else(|| level_not_found(self, format!("'{label}'")))
    }

    fn has_level(&self, value: i32) -> bool {
        level_records(self.memory(), self.record()).any(|l| l.value == value)
    }

    fn has_level_label(&self, label: &str) -> bool {
        self.try_value_for_label(label).is_some()
    }
}

/// Fails unless `T` is the cell type the column described by `s` stores.
pub(crate) fn check_storage<T: Cell, C: ColumnRead + ?Sized>(
    column: &C,
    s: &ColumnRecord,
) -> Result<()> {
    let expected = StorageKind::of(s.data_type, s.measure_type);
    if T::KIND != expected {
        return Err(StoreError::WrongStorage {
            column: column.memory().resolve_str(s.name).to_owned(),
            expected,
            found: T::KIND,
        });
    }
    Ok(())
}

fn level_not_found<C: ColumnRead + ?Sized>(column: &C, key: String) -> StoreError {
    StoreError::LevelNotFound {
        key,
        column: column.name().to_owned(),
    }
}

/// Decoded level records of a column, in dictionary order.
pub(crate) fn level_records<'m>(
    mm: &'m MemoryMap,
    s: ColumnRecord,
) -> impl Iterator<Item = LevelRecord> + 'm {
    let levels = s.levels;
    (0..s.levels_used as usize).map(move |i| mm.resolve(levels).get_at(i))
}

/// Iterator over a column's levels.
#[derive(Clone)]
pub struct Levels<'a> {
    mm: &'a MemoryMap,
    levels: Ref<LevelRecord>,
    by_import: bool,
    next: usize,
    end: usize,
}

impl<'a> Levels<'a> {
    fn new(mm: &'a MemoryMap, s: &ColumnRecord) -> Self {
        Self {
            mm,
            levels: s.levels,
            by_import: s.data_type == DataType::Text,
            next: 0,
            end: s.levels_used as usize,
        }
    }
}

impl<'a> Iterator for Levels<'a> {
    type Item = LevelData<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.end {
            return None;
        }
        let l = self.mm.resolve(self.levels).get_at(self.next);
        self.next += 1;
        let key = if self.by_import {
            LevelKey::Import(self.mm.resolve_str(l.import_value))
        } else {
            LevelKey::Value(l.value)
        };
        Some(LevelData {
            key,
            label: self.mm.resolve_str(l.label),
            filtered: l.count_ex_filtered == 0,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Levels<'_> {}
impl FusedIterator for Levels<'_> {}

/// Read-only view of a column.
#[derive(Clone, Copy)]
pub struct Column<'a> {
    mm: &'a MemoryMap,
    rel: Ref<ColumnRecord>,
}

impl<'a> Column<'a> {
    pub(crate) fn new(mm: &'a MemoryMap, rel: Ref<ColumnRecord>) -> Self {
        Self { mm, rel }
    }
}

impl ColumnRead for Column<'_> {
    fn memory(&self) -> &MemoryMap {
        self.mm
    }

    fn rel(&self) -> Ref<ColumnRecord> {
        self.rel
    }
}

impl fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("data_type", &self.data_type())
            .field("measure_type", &self.measure_type())
            .field("rows", &self.row_count())
            .finish()
    }
}
