//! Structural editing of a dataset.

use std::fmt;

use sharedset_common::ColumnType;
use sharedset_mmap::{MemoryMap, Ref};

use crate::column::ColumnRead;
use crate::column_w::ColumnW;
use crate::dataset::{DataSetRead, column_refs, column_rel, find_by_name};
use crate::error::{ColumnKey, Result, StoreError};
use crate::layout::{Block, ColumnRecord, DataSetRecord};
use crate::options::DataSetOptions;

/// Mutable view of a dataset.
///
/// Structural operations keep every live column at the dataset's row count.
/// Each one allocates everything it needs before it shifts or truncates any
/// column, so a failed allocation leaves the dataset as it was.
pub struct DataSetW<'a> {
    mm: &'a mut MemoryMap,
    root: Ref<DataSetRecord>,
    edited: bool,
    blank: bool,
}

impl DataSetRead for DataSetW<'_> {
    fn memory(&self) -> &MemoryMap {
        self.mm
    }

    fn root(&self) -> Ref<DataSetRecord> {
        self.root
    }
}

impl<'a> DataSetW<'a> {
    /// Lay out an empty dataset in `mm` and make it the region's root.
    pub fn create(mm: &'a mut MemoryMap, options: DataSetOptions) -> Result<Self> {
        let columns = mm.allocate_base::<Ref<ColumnRecord>>(options.column_capacity)?;
        let root = mm.allocate_base::<DataSetRecord>(1)?;
        mm.resolve_mut(root).set(&DataSetRecord {
            columns,
            capacity: options.column_capacity as u32,
            column_count: 0,
            next_column_id: 0,
            block_capacity: options.block_capacity as u32,
            scratch: Ref::NULL,
            row_count: 0,
            free_columns: Ref::NULL,
        });
        mm.set_root(root);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            capacity = options.column_capacity,
            root = root.offset(),
            "created dataset"
        );
        Ok(Self::attach(mm, root))
    }

    /// Attach to the dataset another map created in the same region. Allocates
    /// nothing.
    pub fn retrieve(mm: &'a mut MemoryMap) -> Result<Self> {
        mm.sync()?;
        let root = mm.root::<DataSetRecord>()?;
        Ok(Self::attach(mm, root))
    }

    fn attach(mm: &'a mut MemoryMap, root: Ref<DataSetRecord>) -> Self {
        Self {
            mm,
            root,
            edited: false,
            blank: false,
        }
    }

    pub fn set_edited(&mut self, edited: bool) {
        self.edited = edited;
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }

    pub fn set_blank(&mut self, blank: bool) {
        self.blank = blank;
    }

    pub fn is_blank(&self) -> bool {
        self.blank
    }

    fn update<R>(&mut self, f: impl FnOnce(&mut DataSetRecord) -> R) -> R {
        self.mm.resolve_mut(self.root).update(f)
    }

    fn column_w(&mut self, rel: Ref<ColumnRecord>) -> ColumnW<'_> {
        ColumnW::new(self.mm, self.root, rel)
    }

    fn live_columns(&self) -> Vec<Ref<ColumnRecord>> {
        column_refs(self.mm, self.record()).collect()
    }

    // -- column access --------------------------------------------------------

    pub fn column_mut(&mut self, index: usize) -> Result<ColumnW<'_>> {
        let rel = column_rel(self.mm, self.record(), index)?;
        Ok(self.column_w(rel))
    }

    pub fn column_mut_by_name(&mut self, name: &str) -> Result<ColumnW<'_>> {
        let rel = find_by_name(self.mm, self.record(), name).ok_or_else(|| {
            StoreError::ColumnNotFound {
                key: ColumnKey::Name(name.to_owned()),
            }
        })?;
        Ok(self.column_w(rel))
    }

    pub fn column_mut_by_id(&mut self, id: i32) -> Result<ColumnW<'_>> {
        let index = self.index_of_id(id).ok_or(StoreError::ColumnNotFound {
            key: ColumnKey::Id(id),
        })?;
        self.column_mut(index)
    }

    // -- columns --------------------------------------------------------------

    /// A blank column record, taken from the deleted columns when one is
    /// available. Recycled records keep their block and level arrays.
    fn take_column_record(&mut self) -> Result<Ref<ColumnRecord>> {
        let ds = self.record();
        if !ds.free_columns.is_null() {
            let rel = ds.free_columns;
            let old = self.mm.resolve(rel).get();
            self.update(|d| d.free_columns = old.next_free);
            self.mm.resolve_mut(rel).set(&ColumnRecord {
                blocks: old.blocks,
                blocks_used: old.blocks_used,
                block_capacity: old.block_capacity,
                levels: old.levels,
                levels_capacity: old.levels_capacity,
                ..ColumnRecord::default()
            });
            #[cfg(feature = "tracing")]
            tracing::debug!(
                offset = rel.offset(),
                blocks = old.blocks_used,
                "reusing deleted column"
            );
            return Ok(rel);
        }

        let blocks = self
            .mm
            .allocate_base::<Ref<Block>>(ds.block_capacity as usize)?;
        let rel = self.mm.allocate_base::<ColumnRecord>(1)?;
        self.mm.resolve_mut(rel).set(&ColumnRecord {
            blocks,
            block_capacity: ds.block_capacity,
            ..ColumnRecord::default()
        });
        Ok(rel)
    }

    /// Push a column record onto the list of deleted columns.
    fn release_column_record(&mut self, rel: Ref<ColumnRecord>) {
        let head = self.record().free_columns;
        self.mm.resolve_mut(rel).update(|c| {
            c.id = -1;
            c.next_free = head;
        });
        self.update(|d| d.free_columns = rel);
    }

    /// A new column sized to the dataset but not yet in the column array.
    fn new_column(&mut self, name: &str, import_name: &str) -> Result<Ref<ColumnRecord>> {
        let name = self.mm.allocate_str(name)?;
        let import_name = self.mm.allocate_str(import_name)?;
        let rel = self.take_column_record()?;

        let rows = self.row_count();
        if let Err(e) = self.column_w(rel).reserve(rows) {
            self.release_column_record(rel);
            return Err(e);
        }

        let id = self.update(|d| {
            let id = d.next_column_id;
            d.next_column_id += 1;
            id
        });
        self.mm.resolve_mut(rel).update(|c| {
            c.id = id;
            c.name = name;
            c.import_name = import_name;
        });
        self.column_w(rel).set_row_count::<i32>(rows)?;
        Ok(rel)
    }

    /// Add a data column after the existing ones, filled with missing values.
    pub fn append_column(&mut self, name: &str, import_name: &str) -> Result<ColumnW<'_>> {
        let ds = self.record();
        if ds.column_count >= ds.capacity {
            return Err(StoreError::CapacityExceeded {
                capacity: ds.capacity as usize,
            });
        }
        let rel = self.new_column(name, import_name)?;

        let ds = self.record();
        self.mm
            .resolve_mut(ds.columns)
            .set_at(ds.column_count as usize, &rel);
        self.update(|d| d.column_count += 1);
        Ok(self.column_w(rel))
    }

    /// Add a data column at `index`, moving the columns from `index` on one
    /// slot along.
    pub fn insert_column(
        &mut self,
        index: usize,
        name: &str,
        import_name: &str,
    ) -> Result<ColumnW<'_>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("insert_column", index, name).entered();

        let count = self.column_count();
        if index > count {
            return Err(StoreError::OutOfRange { index, count });
        }
        let rel = self.append_column(name, import_name)?.rel();

        let ds = self.record();
        let mut columns = self.mm.resolve_mut(ds.columns);
        columns.copy_within(index..count, index + 1);
        columns.set_at(index, &rel);
        Ok(self.column_w(rel))
    }

    /// Remove columns `start..=end`. Their storage is kept for reuse by later
    /// appends.
    pub fn delete_columns(&mut self, start: usize, end: usize) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("delete_columns", start, end).entered();

        let count = self.column_count();
        if end < start || end >= count {
            return Err(StoreError::OutOfRange { index: end, count });
        }
        let removed: Vec<Ref<ColumnRecord>> = self.live_columns()[start..=end].to_vec();

        let ds = self.record();
        self.mm
            .resolve_mut(ds.columns)
            .copy_within(end + 1..count, start);
        self.update(|d| d.column_count -= removed.len() as u32);

        let mut filter_removed = false;
        for rel in removed {
            filter_removed |= self.mm.resolve(rel).get().column_type == ColumnType::Filter;
            self.release_column_record(rel);
        }
        if filter_removed {
            self.update_all_level_counts();
        }
        Ok(())
    }

    // -- rows -----------------------------------------------------------------

    fn reserve_all(&mut self, columns: &[Ref<ColumnRecord>], rows: usize) -> Result<()> {
        for &rel in columns {
            self.column_w(rel).reserve(rows)?;
        }
        Ok(())
    }

    /// Resize every column to `rows` rows, then publish the new row count.
    pub fn set_row_count(&mut self, rows: usize) -> Result<()> {
        let columns = self.live_columns();

        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("set_row_count", rows, columns = columns.len()).entered();

        self.reserve_all(&columns, rows)?;
        let shrinking = rows < self.row_count();
        for &rel in &columns {
            self.column_w(rel).resize(rows)?;
        }
        self.update(|d| d.row_count = rows as u32);

        if shrinking {
            self.update_all_level_counts();
        }
        Ok(())
    }

    /// Add `count` missing rows to the end of every column.
    pub fn append_rows(&mut self, count: usize) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("append_rows", count).entered();

        let rows = self.row_count();
        self.set_row_count(rows + count)
    }

    /// Insert missing rows so that they occupy `start..=end`.
    pub fn insert_rows(&mut self, start: usize, end: usize) -> Result<()> {
        let rows = self.row_count();
        if end < start || start > rows {
            return Err(StoreError::OutOfRange {
                index: start,
                count: rows,
            });
        }
        let count = end - start + 1;
        let columns = self.live_columns();

        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("insert_rows", start, count, columns = columns.len()).entered();

        self.reserve_all(&columns, rows + count)?;
        for &rel in &columns {
            self.column_w(rel).insert_missing(start, count)?;
        }
        self.update(|d| d.row_count = (rows + count) as u32);
        Ok(())
    }

    /// Delete rows `start..=end` from every column and recount level usage.
    pub fn delete_rows(&mut self, start: usize, end: usize) -> Result<()> {
        let rows = self.row_count();
        if end < start || end >= rows {
            return Err(StoreError::OutOfRange {
                index: end,
                count: rows,
            });
        }
        let count = end - start + 1;
        let columns = self.live_columns();

        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("delete_rows", start, count, columns = columns.len()).entered();

        for &rel in &columns {
            self.column_w(rel).remove_rows(start, count)?;
        }
        self.update(|d| d.row_count = (rows - count) as u32);
        self.update_all_level_counts();
        Ok(())
    }

    /// Recount level usage of every column that has levels, e.g. after a
    /// filter column changed.
    pub fn update_all_level_counts(&mut self) {
        for rel in self.live_columns() {
            let mut column = self.column_w(rel);
            if column.has_levels() {
                column.update_level_counts();
            }
        }
    }

    // -- scratch column -------------------------------------------------------

    fn scratch_rel(&mut self) -> Result<Ref<ColumnRecord>> {
        let scratch = self.record().scratch;
        if !scratch.is_null() {
            return Ok(scratch);
        }
        let rel = self.take_column_record()?;
        let rows = self.row_count();
        self.column_w(rel).set_row_count::<i32>(rows)?;
        self.update(|d| d.scratch = rel);
        #[cfg(feature = "tracing")]
        tracing::debug!(offset = rel.offset(), "materialised scratch column");
        Ok(rel)
    }

    /// The spare column used to build a replacement for a live column. It
    /// still holds whatever it held when it was last swapped out.
    pub fn scratch_column_mut(&mut self) -> Result<ColumnW<'_>> {
        let rel = self.scratch_rel()?;
        Ok(self.column_w(rel))
    }

    /// Publish the scratch column's storage in place of column `id`.
    ///
    /// The scratch takes over the live column's identity (id, names, column
    /// type, flags and formula) and its `changes` plus one. The displaced
    /// column becomes the new scratch and is returned; it keeps its id until
    /// [`discard_scratch_column`](DataSetW::discard_scratch_column).
    pub fn swap_with_scratch_column(&mut self, id: i32) -> Result<ColumnW<'_>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("swap_with_scratch_column", id).entered();

        let index = self.index_of_id(id).ok_or(StoreError::ColumnNotFound {
            key: ColumnKey::Id(id),
        })?;
        let scratch = self.scratch_rel()?;
        let live_rel = column_rel(self.mm, self.record(), index)?;
        let live = self.mm.resolve(live_rel).get();

        let rows = self.row_count();
        self.column_w(scratch).resize(rows)?;
        self.mm.resolve_mut(scratch).update(|c| {
            c.id = live.id;
            c.name = live.name;
            c.import_name = live.import_name;
            c.column_type = live.column_type;
            c.auto_measure = live.auto_measure;
            c.active = live.active;
            c.trim_levels = live.trim_levels;
            c.changes = live.changes + 1;
            c.formula = live.formula;
            c.formula_message = live.formula_message;
        });

        let ds = self.record();
        self.mm.resolve_mut(ds.columns).set_at(index, &scratch);
        self.update(|d| d.scratch = live_rel);

        let mut published = self.column_w(scratch);
        if published.has_levels() {
            published.update_level_counts();
        }
        Ok(self.column_w(live_rel))
    }

    /// Clear the scratch column's id if it is still `id`, so the abandoned
    /// column cannot be mistaken for a live one.
    pub fn discard_scratch_column(&mut self, id: i32) {
        let scratch = self.record().scratch;
        if scratch.is_null() {
            return;
        }
        self.mm.resolve_mut(scratch).update(|c| {
            if c.id == id {
                c.id = -1;
            }
        });
    }
}

impl fmt::Debug for DataSetW<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSetW")
            .field("rows", &self.row_count())
            .field("columns", &self.column_count())
            .field("edited", &self.edited)
            .field("blank", &self.blank)
            .finish()
    }
}
