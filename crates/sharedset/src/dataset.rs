//! Read access to a dataset.

use std::fmt;
use std::iter::FusedIterator;

use sharedset_common::{ColumnType, StorageKind};
use sharedset_mmap::{MemoryMap, Ref};

use crate::cell::read_cell;
use crate::column::{Column, ColumnRead};
use crate::error::{ColumnKey, Result, StoreError};
use crate::layout::{ColumnRecord, DataSetRecord};

/// The read contract shared by [`DataSet`] and [`DataSetW`](crate::DataSetW).
pub trait DataSetRead {
    fn memory(&self) -> &MemoryMap;

    /// The dataset root's location in the region.
    fn root(&self) -> Ref<DataSetRecord>;

    fn record(&self) -> DataSetRecord {
        self.memory().resolve(self.root()).get()
    }

    fn row_count(&self) -> usize {
        self.record().row_count as usize
    }

    fn column_count(&self) -> usize {
        self.record().column_count as usize
    }

    /// Column slots fixed at creation.
    fn capacity(&self) -> usize {
        self.record().capacity as usize
    }

    fn column(&self, index: usize) -> Result<Column<'_>> {
        let rel = column_rel(self.memory(), self.record(), index)?;
        Ok(Column::new(self.memory(), rel))
    }

    /// First column named `name` (exact, case-sensitive).
    fn column_by_name(&self, name: &str) -> Result<Column<'_>> {
        find_by_name(self.memory(), self.record(), name)
            .map(|rel| Column::new(self.memory(), rel))
            .ok_or_else(|| StoreError::ColumnNotFound {
                key: ColumnKey::Name(name.to_owned()),
            })
    }

    fn column_by_id(&self, id: i32) -> Result<Column<'_>> {
        let index = self.index_of_id(id).ok_or(StoreError::ColumnNotFound {
            key: ColumnKey::Id(id),
        })?;
        self.column(index)
    }

    fn index_of_id(&self, id: i32) -> Option<usize> {
        let mm = self.memory();
        column_refs(mm, self.record()).position(|rel| mm.resolve(rel).get().id == id)
    }

    fn columns(&self) -> Columns<'_> {
        Columns::new(self.memory(), self.record())
    }

    /// Whether an active filter column excludes `row`.
    fn is_row_filtered(&self, row: usize) -> bool {
        let mm = self.memory();
        RowFilter::load(mm, self.root()).is_filtered(mm, row)
    }

    /// Rows no active filter excludes.
    fn row_count_ex_filtered(&self) -> usize {
        let mm = self.memory();
        let filter = RowFilter::load(mm, self.root());
        let rows = self.row_count();
        if filter.is_empty() {
            return rows;
        }
        (0..rows).filter(|&row| !filter.is_filtered(mm, row)).count()
    }

    /// Id still carried by the scratch column, if it has been materialised and
    /// not discarded.
    fn scratch_id(&self) -> Option<i32> {
        let scratch = self.record().scratch;
        if scratch.is_null() {
            return None;
        }
        Some(self.memory().resolve(scratch).get().id).filter(|&id| id >= 0)
    }
}

pub(crate) fn column_rel(
    mm: &MemoryMap,
    ds: DataSetRecord,
    index: usize,
) -> Result<Ref<ColumnRecord>> {
    if index >= ds.column_count as usize {
        return Err(StoreError::OutOfRange {
            index,
            count: ds.column_count as usize,
        });
    }
    Ok(mm.resolve(ds.columns).get_at(index))
}

/// Live column records, in order.
pub(crate) fn column_refs(
    mm: &MemoryMap,
    ds: DataSetRecord,
) -> impl Iterator<Item = Ref<ColumnRecord>> + '_ {
    (0..ds.column_count as usize).map(move |i| mm.resolve(ds.columns).get_at(i))
}

pub(crate) fn find_by_name(
    mm: &MemoryMap,
    ds: DataSetRecord,
    name: &str,
) -> Option<Ref<ColumnRecord>> {
    column_refs(mm, ds).find(|&rel| mm.resolve_str(mm.resolve(rel).get().name) == name)
}

/// The active filter columns of a dataset. A row is filtered out when any of
/// them holds `0` for it.
pub(crate) struct RowFilter {
    filters: Vec<ColumnRecord>,
}

impl RowFilter {
    pub(crate) fn load(mm: &MemoryMap, root: Ref<DataSetRecord>) -> Self {
        Self::load_except(mm, root, Ref::NULL)
    }

    /// The filter columns other than `skip`.
    pub(crate) fn load_except(
        mm: &MemoryMap,
        root: Ref<DataSetRecord>,
        skip: Ref<ColumnRecord>,
    ) -> Self {
        let ds = mm.resolve(root).get();
        let filters = column_refs(mm, ds)
            .filter(|&rel| rel != skip)
            .map(|rel| mm.resolve(rel).get())
            .filter(RowFilter::is_filter)
            .collect();
        Self { filters }
    }

    pub(crate) fn is_filter(c: &ColumnRecord) -> bool {
        c.active
            && c.column_type == ColumnType::Filter
            && StorageKind::of(c.data_type, c.measure_type) == StorageKind::Integer
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub(crate) fn is_filtered(&self, mm: &MemoryMap, row: usize) -> bool {
        self.filters
            .iter()
            .any(|c| row < c.row_count as usize && read_cell::<i32>(mm, c, row) == 0)
    }
}

/// Iterator over a dataset's columns, in order.
#[derive(Clone)]
pub struct Columns<'a> {
    mm: &'a MemoryMap,
    columns: Ref<Ref<ColumnRecord>>,
    next: usize,
    end: usize,
}

impl<'a> Columns<'a> {
    fn new(mm: &'a MemoryMap, ds: DataSetRecord) -> Self {
        Self {
            mm,
            columns: ds.columns,
            next: 0,
            end: ds.column_count as usize,
        }
    }
}

impl<'a> Iterator for Columns<'a> {
    type Item = Column<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.end {
            return None;
        }
        let rel = self.mm.resolve(self.columns).get_at(self.next);
        self.next += 1;
        Some(Column::new(self.mm, rel))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Columns<'_> {}
impl FusedIterator for Columns<'_> {}

/// Read-only view of a dataset, for processes that never edit it.
#[derive(Clone, Copy)]
pub struct DataSet<'a> {
    mm: &'a MemoryMap,
    root: Ref<DataSetRecord>,
}

impl<'a> DataSet<'a> {
    /// Attach to the dataset stored at the region's root. Allocates nothing.
    ///
    /// A map that may be stale should be [`sync`](MemoryMap::sync)ed first.
    pub fn retrieve(mm: &'a MemoryMap) -> Result<Self> {
        let root = mm.root::<DataSetRecord>()?;
        Ok(Self { mm, root })
    }
}

impl DataSetRead for DataSet<'_> {
    fn memory(&self) -> &MemoryMap {
        self.mm
    }

    fn root(&self) -> Ref<DataSetRecord> {
        self.root
    }
}

impl fmt::Debug for DataSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSet")
            .field("rows", &self.row_count())
            .field(
                "columns",
                &self.columns().map(|c| c.name().to_owned()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
