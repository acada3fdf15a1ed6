//! A columnar dataset that lives entirely inside a [`MemoryMap`] region, so
//! that several processes can map the same region and read the same live
//! data without copying it.
//!
//! Every structure is reached through relative references, never addresses.
//! Editing goes through [`DataSetW`] and [`ColumnW`]; readers use [`DataSet`]
//! and [`Column`], which never allocate.
//!
//! ```
//! use sharedset::{ColumnRead, DataSetOptions, DataSetRead, DataSetW, MapOptions, MemoryMap};
//!
//! let mut mm = MemoryMap::in_memory(MapOptions::default()).unwrap();
//! let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
//! ds.append_column("x", "x").unwrap();
//! ds.append_rows(3).unwrap();
//! ds.column_mut(0).unwrap().set_ivalue(1, 5, false).unwrap();
//! ds.insert_rows(1, 1).unwrap();
//!
//! let x = ds.column(0).unwrap();
//! assert_eq!(x.row_count(), 4);
//! assert_eq!(x.raw::<i32>(2).unwrap(), 5);
//! ```

pub mod cell;
pub mod column;
pub mod column_w;
pub mod dataset;
pub mod dataset_w;
pub mod error;
pub mod layout;
pub mod options;

pub use cell::Cell;
pub use column::{Column, ColumnRead, Levels};
pub use column_w::ColumnW;
pub use dataset::{Columns, DataSet, DataSetRead};
pub use dataset_w::DataSetW;
pub use error::{ColumnKey, Result, StoreError};
pub use layout::ROWS_PER_BLOCK;
pub use options::DataSetOptions;

pub use sharedset_common::{
    CellValue, ColumnType, DataType, LevelData, LevelKey, MISSING_DECIMAL, MISSING_INT,
    MeasureType, StorageKind,
};
pub use sharedset_mmap::{MapError, MapOptions, MemoryMap, Ref};
