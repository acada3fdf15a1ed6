//! Write access to one column.

use std::fmt;
use std::ops::Range;

use rustc_hash::FxHashMap;
use sharedset_common::{
    ColumnType, DataType, MISSING_DECIMAL, MISSING_INT, MeasureType, StorageKind,
};
use sharedset_mmap::{MemoryMap, Ref};

use crate::cell::{Cell, cell_ref, read_cell, write_cell};
use crate::column::{ColumnRead, check_storage, level_records};
use crate::dataset::RowFilter;
use crate::error::{Result, StoreError};
use crate::layout::{
    BLOCK_BYTES, Block, ColumnRecord, DataSetRecord, LevelRecord, ROWS_PER_BLOCK,
};

/// Smallest level array allocated for a column.
const MIN_LEVEL_CAPACITY: usize = 16;

/// Run `$body` with `$T` bound to the cell type of `$kind`.
macro_rules! with_cell_type {
    ($kind:expr, $T:ident => $body:expr) => {
        match $kind {
            StorageKind::Integer => {
                type $T = i32;
                $body
            }
            StorageKind::Decimal => {
                type $T = f64;
                $body
            }
            StorageKind::Text => {
                type $T = Ref<str>;
                $body
            }
        }
    };
}

/// A cell lifted out of storage while a column changes type.
enum Owned {
    Missing,
    Int(i32),
    Dec(f64),
    Text(String),
}

/// Mutable view of a column.
///
/// Holds the map exclusively, so no other handle into the region can be alive
/// while the column is being edited.
pub struct ColumnW<'a> {
    mm: &'a mut MemoryMap,
    root: Ref<DataSetRecord>,
    rel: Ref<ColumnRecord>,
    /// Filter columns other than this one, loaded on the first tracked edit.
    others: Option<RowFilter>,
}

impl ColumnRead for ColumnW<'_> {
    fn memory(&self) -> &MemoryMap {
        self.mm
    }

    fn rel(&self) -> Ref<ColumnRecord> {
        self.rel
    }
}

impl<'a> ColumnW<'a> {
    pub(crate) fn new(
        mm: &'a mut MemoryMap,
        root: Ref<DataSetRecord>,
        rel: Ref<ColumnRecord>,
    ) -> Self {
        Self {
            mm,
            root,
            rel,
            others: None,
        }
    }

    fn update<R>(&mut self, f: impl FnOnce(&mut ColumnRecord) -> R) -> R {
        self.mm.resolve_mut(self.rel).update(f)
    }

    fn check_row(&self, row: usize) -> Result<ColumnRecord> {
        let s = self.record();
        if row >= s.row_count as usize {
            return Err(StoreError::OutOfRange {
                index: row,
                count: s.row_count as usize,
            });
        }
        Ok(s)
    }

    /// Whether `row` passes the dataset's row filter. This column is read
    /// afresh since it may itself be a filter being edited.
    fn row_kept(&mut self, row: usize) -> bool {
        let (mm, root, rel) = (&*self.mm, self.root, self.rel);
        let others = self
            .others
            .get_or_insert_with(|| RowFilter::load_except(mm, root, rel));
        if others.is_filtered(mm, row) {
            return false;
        }
        let own = mm.resolve(rel).get();
        !(RowFilter::is_filter(&own) && read_cell::<i32>(mm, &own, row) == 0)
    }

    // -- metadata -------------------------------------------------------------

    pub fn set_id(&mut self, id: i32) {
        self.update(|c| c.id = id);
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let name = self.mm.allocate_str(name)?;
        self.update(|c| c.name = name);
        Ok(())
    }

    pub fn set_import_name(&mut self, import_name: &str) -> Result<()> {
        let import_name = self.mm.allocate_str(import_name)?;
        self.update(|c| c.import_name = import_name);
        Ok(())
    }

    pub fn set_column_type(&mut self, column_type: ColumnType) {
        self.update(|c| c.column_type = column_type);
    }

    /// Change the measure type, converting stored values if the storage kind
    /// changes. See [`ColumnW::change`].
    pub fn set_measure_type(&mut self, measure_type: MeasureType) -> Result<()> {
        let data_type = self.data_type();
        self.change(data_type, measure_type)
    }

    /// Change the data type, converting stored values. See [`ColumnW::change`].
    pub fn change_data_type(&mut self, data_type: DataType) -> Result<()> {
        let measure_type = self.measure_type();
        self.change(data_type, measure_type)
    }

    pub fn set_auto_measure(&mut self, auto_measure: bool) {
        self.update(|c| c.auto_measure = auto_measure);
    }

    pub fn set_dps(&mut self, dps: u8) {
        self.update(|c| c.dps = dps);
    }

    pub fn set_active(&mut self, active: bool) {
        self.update(|c| c.active = active);
    }

    pub fn set_trim_levels(&mut self, trim_levels: bool) {
        self.update(|c| c.trim_levels = trim_levels);
    }

    /// Replace the formula. Bumps [`changes`](ColumnRead::changes).
    pub fn set_formula(&mut self, formula: &str) -> Result<()> {
        let formula = self.mm.allocate_str(formula)?;
        self.update(|c| {
            c.formula = formula;
            c.changes += 1;
        });
        Ok(())
    }

    pub fn set_formula_message(&mut self, message: &str) -> Result<()> {
        let message = self.mm.allocate_str(message)?;
        self.update(|c| c.formula_message = message);
        Ok(())
    }

    pub(crate) fn bump_changes(&mut self) {
        self.update(|c| c.changes += 1);
    }

    // -- storage --------------------------------------------------------------

    /// Ensure blocks exist for `rows` rows without changing the row count.
    pub fn reserve(&mut self, rows: usize) -> Result<()> {
        let s = self.record();
        let needed = rows.div_ceil(ROWS_PER_BLOCK);
        let used = s.blocks_used as usize;
        if needed <= used {
            return Ok(());
        }

        if s.blocks.is_null() || needed > s.block_capacity as usize {
            let mut capacity = (s.block_capacity as usize).max(1);
            while capacity < needed {
                capacity *= 2;
            }
            let blocks = self.mm.allocate_base::<Ref<Block>>(capacity)?;
            for i in 0..used {
                let block = self.mm.resolve(s.blocks).get_at(i);
                self.mm.resolve_mut(blocks).set_at(i, &block);
            }
            self.update(|c| {
                c.blocks = blocks;
                c.block_capacity = capacity as u32;
            });
        }

        for i in used..needed {
            let block = self.mm.allocate_base::<u8>(BLOCK_BYTES)?.cast::<Block>();
            let blocks = self.record().blocks;
            self.mm.resolve_mut(blocks).set_at(i, &block);
            self.update(|c| c.blocks_used = i as u32 + 1);
        }
        Ok(())
    }

    /// Write `value` to every row in `rows`, a block at a time.
    fn fill<T: Cell>(&mut self, rows: Range<usize>, value: T) {
        let s = self.record();
        let mut row = rows.start;
        while row < rows.end {
            let end = ((row / ROWS_PER_BLOCK + 1) * ROWS_PER_BLOCK).min(rows.end);
            let first = cell_ref::<T>(self.mm, &s, row);
            self.mm.resolve_mut(first).fill(0..end - row, &value);
            row = end;
        }
    }

    /// Grow or shrink to exactly `rows` rows; new rows hold the missing value.
    /// Shrinking keeps the blocks for later growth.
    pub fn set_row_count<T: Cell>(&mut self, rows: usize) -> Result<()> {
        self.reserve(rows)?;
        let old = self.row_count();
        if rows > old {
            self.fill(old..rows, T::missing());
        }
        self.update(|c| c.row_count = rows as u32);
        Ok(())
    }

    /// Append one row. Level counts are left alone; see
    /// [`ColumnW::update_level_counts`].
    pub fn append<T: Cell>(&mut self, value: T) -> Result<()> {
        let row = self.row_count();
        self.reserve(row + 1)?;
        let s = self.record();
        write_cell(self.mm, &s, row, value);
        self.update(|c| c.row_count += 1);
        Ok(())
    }

    /// Insert `count` missing rows before `start`.
    pub fn insert_rows<T: Cell>(&mut self, start: usize, count: usize) -> Result<()> {
        let rows = self.row_count();
        if start > rows {
            return Err(StoreError::OutOfRange {
                index: start,
                count: rows,
            });
        }
        self.reserve(rows + count)?;
        let s = self.record();
        for row in (start..rows).rev() {
            let value: T = read_cell(self.mm, &s, row);
            write_cell(self.mm, &s, row + count, value);
        }
        self.fill(start..start + count, T::missing());
        self.update(|c| c.row_count = (rows + count) as u32);
        Ok(())
    }

    /// Remove `count` rows starting at `start`, shifting later rows down.
    pub fn delete_rows<T: Cell>(&mut self, start: usize, count: usize) -> Result<()> {
        let rows = self.row_count();
        if start + count > rows {
            return Err(StoreError::OutOfRange {
                index: (start + count).saturating_sub(1),
                count: rows,
            });
        }
        let s = self.record();
        for row in start..rows - count {
            let value: T = read_cell(self.mm, &s, row + count);
            write_cell(self.mm, &s, row, value);
        }
        self.update(|c| c.row_count = (rows - count) as u32);
        Ok(())
    }

    /// [`set_row_count`](ColumnW::set_row_count) for the column's own cell type.
    pub fn resize(&mut self, rows: usize) -> Result<()> {
        with_cell_type!(self.storage_kind(), T => self.set_row_count::<T>(rows))
    }

    /// [`insert_rows`](ColumnW::insert_rows) for the column's own cell type.
    pub fn insert_missing(&mut self, start: usize, count: usize) -> Result<()> {
        with_cell_type!(self.storage_kind(), T => self.insert_rows::<T>(start, count))
    }

    /// [`delete_rows`](ColumnW::delete_rows) for the column's own cell type.
    pub fn remove_rows(&mut self, start: usize, count: usize) -> Result<()> {
        with_cell_type!(self.storage_kind(), T => self.delete_rows::<T>(start, count))
    }

    // -- cells ----------------------------------------------------------------

    /// Store an integer (or level value) at `row`.
    ///
    /// Unless `initing`, level usage counts follow the edit and
    /// [`changes`](ColumnRead::changes) is bumped. On an integer column with
    /// levels, a value with no level gets one; on a text column it is an error.
    pub fn set_ivalue(&mut self, row: usize, value: i32, initing: bool) -> Result<()> {
        let s = self.check_row(row)?;
        check_storage::<i32, _>(&*self, &s)?;
        if initing {
            write_cell(self.mm, &s, row, value);
            return Ok(());
        }

        let old: i32 = read_cell(self.mm, &s, row);
        let tracked = s.measure_type.has_levels() && old != value;
        if tracked && value != MISSING_INT && !self.has_level(value) {
            if s.data_type != DataType::Integer {
                return Err(StoreError::LevelNotFound {
                    key: value.to_string(),
                    column: self.name().to_owned(),
                });
            }
            let label = value.to_string();
            self.insert_level(value, &label, None)?;
        }

        let s = self.record();
        write_cell(self.mm, &s, row, value);

        if tracked {
            let kept = self.row_kept(row);
            if old != MISSING_INT {
                self.adjust_level_count(old, -1, kept);
            }
            if value != MISSING_INT {
                self.adjust_level_count(value, 1, kept);
            }
        }
        self.bump_changes();
        Ok(())
    }

    pub fn set_dvalue(&mut self, row: usize, value: f64, initing: bool) -> Result<()> {
        let s = self.check_row(row)?;
        check_storage::<f64, _>(&*self, &s)?;
        write_cell(self.mm, &s, row, value);
        if !initing {
            self.bump_changes();
        }
        Ok(())
    }

    /// Store a string at `row` of an identifier column. The empty string is
    /// the missing value.
    pub fn set_svalue(&mut self, row: usize, value: &str, initing: bool) -> Result<()> {
        let s = self.check_row(row)?;
        check_storage::<Ref<str>, _>(&*self, &s)?;
        let value = if value.is_empty() {
            Ref::NULL
        } else {
            self.mm.allocate_str(value)?
        };
        let s = self.record();
        write_cell(self.mm, &s, row, value);
        if !initing {
            self.bump_changes();
        }
        Ok(())
    }

    /// Set `row` to the missing value.
    pub fn clear_at(&mut self, row: usize) -> Result<()> {
        match self.storage_kind() {
            StorageKind::Integer => self.set_ivalue(row, MISSING_INT, false),
            StorageKind::Decimal => self.set_dvalue(row, MISSING_DECIMAL, false),
            StorageKind::Text => self.set_svalue(row, "", false),
        }
    }

    // -- levels ---------------------------------------------------------------

    fn grow_levels(&mut self, needed: usize) -> Result<()> {
        let s = self.record();
        if needed <= s.levels_capacity as usize {
            return Ok(());
        }
        let mut capacity = (s.levels_capacity as usize).max(MIN_LEVEL_CAPACITY);
        while capacity < needed {
            capacity *= 2;
        }
        let levels = self.mm.allocate_base::<LevelRecord>(capacity)?;
        for i in 0..s.levels_used as usize {
            let level = self.mm.resolve(s.levels).get_at(i);
            self.mm.resolve_mut(levels).set_at(i, &level);
        }
        self.update(|c| {
            c.levels = levels;
            c.levels_capacity = capacity as u32;
        });
        Ok(())
    }

    fn insert_level_at(
        &mut self,
        index: usize,
        value: i32,
        label: &str,
        import_value: Option<&str>,
    ) -> Result<()> {
        if self.has_level(value) {
            return Err(StoreError::DuplicateLevel {
                value,
                column: self.name().to_owned(),
            });
        }
        let label_ref = self.mm.allocate_str(label)?;
        let import_ref = match import_value {
            Some(import_value) if import_value != label => self.mm.allocate_str(import_value)?,
            _ => label_ref,
        };
        let used = self.level_count();
        self.grow_levels(used + 1)?;

        let s = self.record();
        let mut levels = self.mm.resolve_mut(s.levels);
        levels.copy_within(index..used, index + 1);
        levels.set_at(
            index,
            &LevelRecord {
                value,
                count: 0,
                count_ex_filtered: 0,
                import_value: import_ref,
                label: label_ref,
            },
        );
        self.update(|c| c.levels_used += 1);
        Ok(())
    }

    /// Add a level after the existing ones. `import_value` defaults to the
    /// label.
    pub fn append_level(
        &mut self,
        value: i32,
        label: &str,
        import_value: Option<&str>,
    ) -> Result<()> {
        let index = self.level_count();
        self.insert_level_at(index, value, label, import_value)
    }

    /// Add a level before the first level with a greater value.
    pub fn insert_level(
        &mut self,
        value: i32,
        label: &str,
        import_value: Option<&str>,
    ) -> Result<()> {
        let index = level_records(self.mm, self.record())
            .position(|l| l.value > value)
            .unwrap_or_else(|| self.level_count());
        self.insert_level_at(index, value, label, import_value)
    }

    pub fn clear_levels(&mut self) {
        self.update(|c| c.levels_used = 0);
    }

    /// Drop levels no row holds, when the column trims its levels. Returns how
    /// many were removed.
    pub fn trim_unused_levels(&mut self) -> usize {
        let s = self.record();
        if !s.trim_levels {
            return 0;
        }
        let mut levels = self.mm.resolve_mut(s.levels);
        let mut kept = 0;
        for i in 0..s.levels_used as usize {
            let level = levels.get_at(i);
            if level.count > 0 {
                levels.set_at(kept, &level);
                kept += 1;
            }
        }
        self.update(|c| c.levels_used = kept as u32);
        s.levels_used as usize - kept
    }

    fn adjust_level_count(&mut self, value: i32, delta: i32, kept: bool) {
        let s = self.record();
        let Some(index) = level_records(self.mm, s).position(|l| l.value == value) else {
            return;
        };
        let mut levels = self.mm.resolve_mut(s.levels);
        let mut level = levels.get_at(index);
        level.count = level.count.saturating_add_signed(delta);
        if kept {
            level.count_ex_filtered = level.count_ex_filtered.saturating_add_signed(delta);
        }
        levels.set_at(index, &level);
    }

    /// Recount every level's usage by scanning all rows, honouring the
    /// dataset's row filter.
    pub fn update_level_counts(&mut self) {
        let s = self.record();
        if !s.measure_type.has_levels()
            || StorageKind::of(s.data_type, s.measure_type) != StorageKind::Integer
        {
            return;
        }
        let filter = RowFilter::load(self.mm, self.root);
        let index: FxHashMap<i32, usize> = level_records(self.mm, s)
            .enumerate()
            .map(|(i, l)| (l.value, i))
            .collect();

        let mut counts = vec![(0u32, 0u32); s.levels_used as usize];
        for row in 0..s.row_count as usize {
            let value: i32 = read_cell(self.mm, &s, row);
            if let Some(&i) = index.get(&value) {
                counts[i].0 += 1;
                if !filter.is_filtered(self.mm, row) {
                    counts[i].1 += 1;
                }
            }
        }

        let mut levels = self.mm.resolve_mut(s.levels);
        for (i, (count, kept)) in counts.into_iter().enumerate() {
            let mut level = levels.get_at(i);
            level.count = count;
            level.count_ex_filtered = kept;
            levels.set_at(i, &level);
        }
    }

    /// Set the decimal places of a decimal column to the fewest (at most 3)
    /// that show every stored value exactly.
    pub fn determine_dps(&mut self) {
        let s = self.record();
        if StorageKind::of(s.data_type, s.measure_type) != StorageKind::Decimal {
            return;
        }
        let mut dps = 0u8;
        for row in 0..s.row_count as usize {
            let value: f64 = read_cell(self.mm, &s, row);
            if !value.is_finite() {
                continue;
            }
            while dps < 3 {
                let scaled = value * 10f64.powi(dps as i32);
                if (scaled - scaled.round()).abs() <= 1e-9 * scaled.abs().max(1.0) {
                    break;
                }
                dps += 1;
            }
            if dps == 3 {
                break;
            }
        }
        self.update(|c| c.dps = dps);
    }

    // -- type changes ---------------------------------------------------------

    /// Change data and measure type together, converting every stored value.
    ///
    /// Decimal columns never carry levels, so a decimal nominal or ordinal
    /// request becomes continuous; a continuous text request becomes nominal.
    /// Text that does not parse as a number converts to the missing value.
    pub fn change(&mut self, data_type: DataType, measure_type: MeasureType) -> Result<()> {
        let measure_type = match (data_type, measure_type) {
            (DataType::Decimal, m) if m.has_levels() => MeasureType::Continuous,
            (DataType::Text, MeasureType::Continuous) => MeasureType::Nominal,
            (_, m) => m,
        };
        let s = self.record();
        if s.data_type == data_type && s.measure_type == measure_type {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "change_column_type",
            column = s.id,
            from = %s.data_type,
            to = %data_type
        )
        .entered();

        if s.data_type == data_type
            && StorageKind::of(data_type, measure_type)
                == StorageKind::of(s.data_type, s.measure_type)
        {
            self.update(|c| c.measure_type = measure_type);
            if !measure_type.has_levels() {
                self.clear_levels();
            } else if !s.measure_type.has_levels() {
                self.rebuild_integer_levels()?;
            }
            self.bump_changes();
            return Ok(());
        }

        let cells = self.lift_cells();
        self.clear_levels();
        self.update(|c| {
            c.data_type = data_type;
            c.measure_type = measure_type;
        });
        self.store_cells(cells)?;
        if data_type == DataType::Integer && measure_type.has_levels() {
            self.rebuild_integer_levels()?;
        }
        self.update_level_counts();
        self.bump_changes();
        Ok(())
    }

    fn lift_cells(&self) -> Vec<Owned> {
        let s = self.record();
        let kind = StorageKind::of(s.data_type, s.measure_type);
        (0..s.row_count as usize)
            .map(|row| match kind {
                StorageKind::Integer => match read_cell::<i32>(self.mm, &s, row) {
                    MISSING_INT => Owned::Missing,
                    v if s.data_type == DataType::Text => {
                        Owned::Text(self.try_label(v).unwrap_or_default().to_owned())
                    }
                    v => Owned::Int(v),
                },
                StorageKind::Decimal => match read_cell::<f64>(self.mm, &s, row) {
                    v if v.is_nan() => Owned::Missing,
                    v => Owned::Dec(v),
                },
                StorageKind::Text => {
                    match self.mm.resolve_str(read_cell::<Ref<str>>(self.mm, &s, row)) {
                        "" => Owned::Missing,
                        v => Owned::Text(v.to_owned()),
                    }
                }
            })
            .collect()
    }

    fn store_cells(&mut self, cells: Vec<Owned>) -> Result<()> {
        let s = self.record();
        let text_factor = s.data_type == DataType::Text && s.measure_type.has_levels();
        for (row, cell) in cells.into_iter().enumerate() {
            match StorageKind::of(s.data_type, s.measure_type) {
                StorageKind::Integer if text_factor => {
                    let text = match cell {
                        Owned::Missing => None,
                        Owned::Text(v) if v.is_empty() => None,
                        Owned::Int(v) => Some(v.to_string()),
                        Owned::Dec(v) => Some(v.to_string()),
                        Owned::Text(v) => Some(v),
                    };
                    let value = match text {
                        None => MISSING_INT,
                        Some(text) => match self.try_value_for_label(&text) {
                            Some(value) => value,
                            None => {
                                let value = self.level_count() as i32;
                                self.append_level(value, &text, None)?;
                                value
                            }
                        },
                    };
                    write_cell(self.mm, &s, row, value);
                }
                StorageKind::Integer => {
                    let value = match cell {
                        Owned::Missing => MISSING_INT,
                        Owned::Int(v) => v,
                        Owned::Dec(v) => round_to_int(v),
                        Owned::Text(v) => parse_int(&v),
                    };
                    write_cell(self.mm, &s, row, value);
                }
                StorageKind::Decimal => {
                    let value = match cell {
                        Owned::Missing => MISSING_DECIMAL,
                        Owned::Int(v) => f64::from(v),
                        Owned::Dec(v) => v,
                        Owned::Text(v) => v.trim().parse().unwrap_or(MISSING_DECIMAL),
                    };
                    write_cell(self.mm, &s, row, value);
                }
                StorageKind::Text => {
                    let value = match cell {
                        Owned::Missing => Ref::NULL,
                        Owned::Int(v) => self.mm.allocate_str(&v.to_string())?,
                        Owned::Dec(v) => self.mm.allocate_str(&v.to_string())?,
                        Owned::Text(v) => self.mm.allocate_str(&v)?,
                    };
                    write_cell(self.mm, &s, row, value);
                }
            }
        }
        Ok(())
    }

    /// Replace the levels of an integer column with its distinct values in
    /// ascending order.
    fn rebuild_integer_levels(&mut self) -> Result<()> {
        let s = self.record();
        let mut values: Vec<i32> = (0..s.row_count as usize)
            .map(|row| read_cell::<i32>(self.mm, &s, row))
            .filter(|&v| v != MISSING_INT)
            .collect();
        values.sort_unstable();
        values.dedup();

        self.clear_levels();
        for value in values {
            let label = value.to_string();
            self.append_level(value, &label, None)?;
        }
        self.update_level_counts();
        Ok(())
    }
}

fn round_to_int(v: f64) -> i32 {
    if v.is_finite() && v >= f64::from(i32::MIN + 1) && v <= f64::from(i32::MAX) {
        v.round() as i32
    } else {
        MISSING_INT
    }
}

fn parse_int(text: &str) -> i32 {
    let text = text.trim();
    match text.parse::<i32>() {
        Ok(v) => v,
        Err(_) => text.parse::<f64>().map(round_to_int).unwrap_or(MISSING_INT),
    }
}

impl fmt::Debug for ColumnW<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnW")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("data_type", &self.data_type())
            .field("measure_type", &self.measure_type())
            .field("rows", &self.row_count())
            .finish()
    }
}
