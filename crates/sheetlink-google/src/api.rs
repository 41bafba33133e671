//! The Sheets API surface this crate talks to.
//!
//! [`SheetsApi`] is the seam between [`SpreadsheetClient`](crate::SpreadsheetClient)
//! and the network: [`RestSheetsApi`](crate::RestSheetsApi) implements it over
//! HTTPS, tests implement it in memory.

use serde::{Deserialize, Serialize};
use sheetlink_core::CellGrid;

use crate::credentials::BoxFuture;
use crate::error::SheetsResult;

/// Spreadsheet metadata (only the parts this crate reads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    /// Sheets in tab order.
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

impl Spreadsheet {
    /// Returns the title of the sheet at `index` in tab order.
    pub fn sheet_title(&self, index: usize) -> Option<&str> {
        self.sheets
            .get(index)
            .map(|sheet| sheet.properties.title.as_str())
    }
}

/// A single sheet (tab).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub properties: SheetProperties,
}

/// Properties of a sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(default)]
    pub title: String,
    /// Omitted by the API for the first sheet.
    #[serde(default)]
    pub index: usize,
}

/// A range of values, as read from or written to the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    /// Absent in responses when the range holds no data.
    #[serde(default)]
    pub values: CellGrid,
}

impl ValueRange {
    /// Builds a row-major value range for a write request.
    pub fn rows(range: impl Into<String>, values: CellGrid) -> Self {
        Self {
            range: Some(range.into()),
            major_dimension: Some("ROWS".to_string()),
            values,
        }
    }
}

/// How written values are interpreted.
///
/// Only `RAW` is sent: values are stored as-is, so `=SUM(A1:A2)` stays a
/// string and a read returns exactly what was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueInputOption {
    #[default]
    Raw,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
        }
    }
}

/// The four remote calls the spreadsheet client is built on.
pub trait SheetsApi: Send + Sync {
    /// Fetches spreadsheet metadata, including the sheet list.
    fn get_spreadsheet<'a>(&'a self, spreadsheet_id: &'a str)
    -> BoxFuture<'a, SheetsResult<Spreadsheet>>;

    /// Reads the values of a range.
    fn get_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, SheetsResult<ValueRange>>;

    /// Appends rows after the last row of the table found in `range`.
    fn append_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>>;

    /// Overwrites the cells of `range`.
    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>>;
}
