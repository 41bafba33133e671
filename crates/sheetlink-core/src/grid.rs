//! Cell grid data model.
//!
//! A [`CellGrid`] is what the Sheets API calls a "value range": an ordered
//! list of rows, each an ordered list of scalar cells. Rows may be ragged;
//! trailing empty cells are dropped by the API, so no width invariant holds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rows of cells, in row-major order.
pub type CellGrid = Vec<Vec<CellValue>>;

/// A single scalar cell value.
///
/// Serialized untagged, so `"a"`, `1.5` and `true` in JSON map directly to
/// [`CellValue::Text`], [`CellValue::Number`] and [`CellValue::Bool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// A boolean cell.
    Bool(bool),
    /// A numeric cell.
    Number(f64),
    /// A text cell. Formatted values are always returned as text.
    Text(String),
}

impl CellValue {
    /// Returns the text content, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for an empty text cell.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Renders a grid as tab-separated lines, one per row.
pub fn to_tsv(grid: &CellGrid) -> String {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
