use std::fmt;

/// Missing value of integer and factor cells.
pub const MISSING_INT: i32 = i32::MIN;

/// Missing value of decimal cells.
pub const MISSING_DECIMAL: f64 = f64::NAN;

/// Typed view of one cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CellValue<'a> {
    Missing,
    Integer(i32),
    Decimal(f64),
    Text(&'a str),
}

impl<'a> CellValue<'a> {
    pub fn from_int(v: i32) -> Self {
        if v == MISSING_INT {
            CellValue::Missing
        } else {
            CellValue::Integer(v)
        }
    }

    pub fn from_decimal(v: f64) -> Self {
        if v.is_nan() {
            CellValue::Missing
        } else {
            CellValue::Decimal(v)
        }
    }

    pub fn from_text(v: &'a str) -> Self {
        if v.is_empty() {
            CellValue::Missing
        } else {
            CellValue::Text(v)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Decimal(v) => write!(f, "{v}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// The key a level is looked up by: its integer value for numeric and factor
/// columns, its import string for text columns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LevelKey<'a> {
    Value(i32),
    Import(&'a str),
}

impl fmt::Display for LevelKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKey::Value(v) => write!(f, "{v}"),
            LevelKey::Import(s) => f.write_str(s),
        }
    }
}

/// One entry of a column's level dictionary as seen by readers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LevelData<'a> {
    pub key: LevelKey<'a>,
    pub label: &'a str,
    /// No row outside the active filter uses this level.
    pub filtered: bool,
}
