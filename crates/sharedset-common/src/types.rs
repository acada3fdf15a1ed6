//! Type tags stored per column.
//!
//! Each enum is stored in the shared region as a single byte, so the
//! discriminants are part of the region layout and must not be renumbered.

use std::fmt;

/// How a column's values come about.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnType {
    #[default]
    Data = 1,
    Computed = 2,
    Recoded = 3,
    /// One value per row: `1` keeps the row, `0` filters it out.
    Filter = 4,
    Output = 5,
}

/// Physical storage kind of a column's values.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    #[default]
    Integer = 1,
    Decimal = 2,
    Text = 3,
}

/// Statistical role of a column's values.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeasureType {
    #[default]
    Nominal = 1,
    Ordinal = 2,
    Continuous = 3,
    Id = 4,
}

impl ColumnType {
    #[inline]
    pub fn from_u8(b: u8) -> Self {
        match b {
            x if x == ColumnType::Computed as u8 => ColumnType::Computed,
            x if x == ColumnType::Recoded as u8 => ColumnType::Recoded,
            x if x == ColumnType::Filter as u8 => ColumnType::Filter,
            x if x == ColumnType::Output as u8 => ColumnType::Output,
            _ => ColumnType::Data,
        }
    }
}

impl DataType {
    #[inline]
    pub fn from_u8(b: u8) -> Self {
        match b {
            x if x == DataType::Decimal as u8 => DataType::Decimal,
            x if x == DataType::Text as u8 => DataType::Text,
            _ => DataType::Integer,
        }
    }
}

impl MeasureType {
    #[inline]
    pub fn from_u8(b: u8) -> Self {
        match b {
            x if x == MeasureType::Ordinal as u8 => MeasureType::Ordinal,
            x if x == MeasureType::Continuous as u8 => MeasureType::Continuous,
            x if x == MeasureType::Id as u8 => MeasureType::Id,
            _ => MeasureType::Nominal,
        }
    }

    /// Nominal and ordinal columns carry a level dictionary.
    pub fn has_levels(self) -> bool {
        !matches!(self, MeasureType::Continuous | MeasureType::Id)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Data => "data",
            Self::Computed => "computed",
            Self::Recoded => "recoded",
            Self::Filter => "filter",
            Self::Output => "output",
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
        })
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nominal => "nominal",
            Self::Ordinal => "ordinal",
            Self::Continuous => "continuous",
            Self::Id => "id",
        })
    }
}

/// What one row cell physically holds.
///
/// Text columns are factor-encoded (an integer level value per row) unless they
/// are identifiers, which store a string per row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageKind {
    Integer,
    Decimal,
    Text,
}

impl StorageKind {
    pub fn of(data_type: DataType, measure_type: MeasureType) -> Self {
        match (data_type, measure_type) {
            (DataType::Decimal, _) => StorageKind::Decimal,
            (DataType::Text, MeasureType::Id) => StorageKind::Text,
            _ => StorageKind::Integer,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
        })
    }
}
