/// Sizing fixed when a dataset is created.
///
/// Both values are written into the region's root, so every process that later
/// attaches with [`DataSetW::retrieve`](crate::DataSetW::retrieve) works with
/// the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSetOptions {
    /// Column slots; appending past this fails.
    pub column_capacity: usize,
    /// Block-pointer slots a new column starts with (grows on demand).
    pub block_capacity: usize,
}

impl Default for DataSetOptions {
    fn default() -> Self {
        Self {
            column_capacity: 65_536,
            block_capacity: 1024,
        }
    }
}

impl DataSetOptions {
    pub fn with_column_capacity(mut self, column_capacity: usize) -> Self {
        self.column_capacity = column_capacity;
        self
    }

    pub fn with_block_capacity(mut self, block_capacity: usize) -> Self {
        self.block_capacity = block_capacity.max(1);
        self
    }
}
