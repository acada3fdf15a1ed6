//! In-region layout of the dataset.
//!
//! These records are the format shared between every process attached to a
//! region: field order and widths below must stay bit-compatible across all of
//! them. Every cross-structure link is a [`Ref`]; nothing stores an address.

use sharedset_common::{ColumnType, DataType, MeasureType};
use sharedset_mmap::{FieldReader, FieldWriter, Record, Ref};

/// Rows held by one block of a column.
pub const ROWS_PER_BLOCK: usize = 4096;

/// Widest cell (decimal or string reference) in bytes.
pub const MAX_CELL_SIZE: usize = 8;

/// Blocks are sized for the widest cell so they can be reused whatever the
/// column's data type becomes.
pub const BLOCK_BYTES: usize = ROWS_PER_BLOCK * MAX_CELL_SIZE;

/// A fixed-capacity page of row cells. Only ever handled through `Ref<Block>`
/// and reinterpreted as the column's cell type.
pub enum Block {}

/// The region's root structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSetRecord {
    /// `capacity` column slots; the first `column_count` are live.
    pub columns: Ref<Ref<ColumnRecord>>,
    pub capacity: u32,
    pub column_count: u32,
    /// Never reused, even after deletion.
    pub next_column_id: i32,
    /// Initial block-pointer slots for every new column.
    pub block_capacity: u32,
    pub scratch: Ref<ColumnRecord>,
    pub row_count: u32,
    /// Head of the list of deleted columns awaiting reuse, linked through
    /// [`ColumnRecord::next_free`].
    pub free_columns: Ref<ColumnRecord>,
}

impl Record for DataSetRecord {
    const SIZE: usize = 48;

    fn decode(buf: &[u8]) -> Self {
        let mut r = FieldReader::new(buf);
        let columns = r.read();
        let capacity = r.read();
        let column_count = r.read();
        let next_column_id = r.read();
        let block_capacity = r.read();
        let scratch = r.read();
        let row_count = r.read();
        r.skip(4);
        let free_columns = r.read();
        Self {
            columns,
            capacity,
            column_count,
            next_column_id,
            block_capacity,
            scratch,
            row_count,
            free_columns,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        w.write(&self.columns);
        w.write(&self.capacity);
        w.write(&self.column_count);
        w.write(&self.next_column_id);
        w.write(&self.block_capacity);
        w.write(&self.scratch);
        w.write(&self.row_count);
        w.pad(4);
        w.write(&self.free_columns);
    }
}

/// One column's metadata and storage directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRecord {
    pub id: i32,
    pub column_type: ColumnType,
    pub data_type: DataType,
    pub measure_type: MeasureType,
    pub auto_measure: bool,
    pub dps: u8,
    pub active: bool,
    pub trim_levels: bool,
    /// Bumped whenever the column's data or formula result is replaced.
    pub changes: u32,
    pub name: Ref<str>,
    pub import_name: Ref<str>,
    pub formula: Ref<str>,
    pub formula_message: Ref<str>,
    pub row_count: u32,
    pub blocks_used: u32,
    pub blocks: Ref<Ref<Block>>,
    pub block_capacity: u32,
    pub levels_used: u32,
    pub levels: Ref<LevelRecord>,
    pub levels_capacity: u32,
    pub next_free: Ref<ColumnRecord>,
}

impl Default for ColumnRecord {
    fn default() -> Self {
        Self {
            id: -1,
            column_type: ColumnType::Data,
            data_type: DataType::Integer,
            measure_type: MeasureType::Nominal,
            auto_measure: false,
            dps: 0,
            active: true,
            trim_levels: true,
            changes: 0,
            name: Ref::NULL,
            import_name: Ref::NULL,
            formula: Ref::NULL,
            formula_message: Ref::NULL,
            row_count: 0,
            blocks_used: 0,
            blocks: Ref::NULL,
            block_capacity: 0,
            levels_used: 0,
            levels: Ref::NULL,
            levels_capacity: 0,
            next_free: Ref::NULL,
        }
    }
}

impl Record for ColumnRecord {
    const SIZE: usize = 96;

    fn decode(buf: &[u8]) -> Self {
        let mut r = FieldReader::new(buf);
        let id = r.read();
        let column_type = ColumnType::from_u8(r.read());
        let data_type = DataType::from_u8(r.read());
        let measure_type = MeasureType::from_u8(r.read());
        let auto_measure = r.read();
        let dps = r.read();
        let active = r.read();
        let trim_levels = r.read();
        r.skip(1);
        let changes = r.read();
        let name = r.read();
        let import_name = r.read();
        let formula = r.read();
        let formula_message = r.read();
        let row_count = r.read();
        let blocks_used = r.read();
        let blocks = r.read();
        let block_capacity = r.read();
        let levels_used = r.read();
        let levels = r.read();
        let levels_capacity = r.read();
        r.skip(4);
        let next_free = r.read();
        Self {
            id,
            column_type,
            data_type,
            measure_type,
            auto_measure,
            dps,
            active,
            trim_levels,
            changes,
            name,
            import_name,
            formula,
            formula_message,
            row_count,
            blocks_used,
            blocks,
            block_capacity,
            levels_used,
            levels,
            levels_capacity,
            next_free,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        w.write(&self.id);
        w.write(&(self.column_type as u8));
        w.write(&(self.data_type as u8));
        w.write(&(self.measure_type as u8));
        w.write(&self.auto_measure);
        w.write(&self.dps);
        w.write(&self.active);
        w.write(&self.trim_levels);
        w.pad(1);
        w.write(&self.changes);
        w.write(&self.name);
        w.write(&self.import_name);
        w.write(&self.formula);
        w.write(&self.formula_message);
        w.write(&self.row_count);
        w.write(&self.blocks_used);
        w.write(&self.blocks);
        w.write(&self.block_capacity);
        w.write(&self.levels_used);
        w.write(&self.levels);
        w.write(&self.levels_capacity);
        w.pad(4);
        w.write(&self.next_free);
    }
}

/// One factor level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRecord {
    pub value: i32,
    /// Rows holding this value.
    pub count: u32,
    /// Rows holding this value that the active filter keeps.
    pub count_ex_filtered: u32,
    pub import_value: Ref<str>,
    pub label: Ref<str>,
}

impl Record for LevelRecord {
    const SIZE: usize = 32;

    fn decode(buf: &[u8]) -> Self {
        let mut r = FieldReader::new(buf);
        let value = r.read();
        let count = r.read();
        let count_ex_filtered = r.read();
        r.skip(4);
        let import_value = r.read();
        let label = r.read();
        Self {
            value,
            count,
            count_ex_filtered,
            import_value,
            label,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        w.write(&self.value);
        w.write(&self.count);
        w.write(&self.count_ex_filtered);
        w.pad(4);
        w.write(&self.import_value);
        w.write(&self.label);
    }
}
