//! In-memory [`SheetsApi`] for tests.
//!
//! Understands enough A1 notation for the client tests: `Title`,
//! `Title!A1`, `Title!A2:B`, `A1:C3` (first sheet) and quoted titles.

use std::collections::HashMap;
use std::sync::Mutex;

use sheetlink_core::{CellGrid, CellValue};

use crate::api::{Sheet, SheetProperties, SheetsApi, Spreadsheet, ValueInputOption, ValueRange};
use crate::credentials::BoxFuture;
use crate::error::{SheetsError, SheetsResult};

struct FakeSheet {
    title: String,
    rows: CellGrid,
}

/// A rectangular area; `None` ends are unbounded.
#[derive(Debug, PartialEq)]
struct Area {
    first_row: usize,
    first_col: usize,
    last_row: Option<usize>,
    last_col: Option<usize>,
}

impl Area {
    const WHOLE: Area = Area {
        first_row: 0,
        first_col: 0,
        last_row: None,
        last_col: None,
    };
}

#[derive(Default)]
pub(crate) struct FakeSheets {
    spreadsheets: Mutex<HashMap<String, Vec<FakeSheet>>>,
    calls: Mutex<Vec<&'static str>>,
    last_input: Mutex<Option<ValueInputOption>>,
}

impl FakeSheets {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_spreadsheet(self, id: &str, titles: &[&str]) -> Self {
        let sheets = titles
            .iter()
            .map(|title| FakeSheet {
                title: title.to_string(),
                rows: Vec::new(),
            })
            .collect();
        self.spreadsheets
            .lock()
            .unwrap()
            .insert(id.to_string(), sheets);
        self
    }

    /// Names of the API methods called so far, in order.
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_input(&self) -> Option<ValueInputOption> {
        *self.last_input.lock().unwrap()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_sheet<T>(
        &self,
        spreadsheet_id: &str,
        range: &str,
        f: impl FnOnce(&mut FakeSheet, Area) -> T,
    ) -> SheetsResult<T> {
        let mut spreadsheets = self.spreadsheets.lock().unwrap();
        let sheets = spreadsheets
            .get_mut(spreadsheet_id)
            .ok_or_else(|| SheetsError::not_found("Requested entity was not found.").with_status(404))?;

        let (title, area) = parse_range(range)
            .ok_or_else(|| SheetsError::bad_request(format!("Unable to parse range: {}", range)))?;

        let sheet = match title {
            Some(title) => sheets.iter_mut().find(|s| s.title == title),
            None => sheets.first_mut(),
        }
        .ok_or_else(|| SheetsError::bad_request(format!("Unable to parse range: {}", range)))?;

        Ok(f(sheet, area))
    }
}

impl SheetsApi for FakeSheets {
    fn get_spreadsheet<'a>(
        &'a self,
        spreadsheet_id: &'a str,
    ) -> BoxFuture<'a, SheetsResult<Spreadsheet>> {
        self.record("get_spreadsheet");
        let result = self
            .spreadsheets
            .lock()
            .unwrap()
            .get(spreadsheet_id)
            .map(|sheets| Spreadsheet {
                spreadsheet_id: Some(spreadsheet_id.to_string()),
                sheets: sheets
                    .iter()
                    .enumerate()
                    .map(|(index, sheet)| Sheet {
                        properties: SheetProperties {
                            sheet_id: index as i64,
                            title: sheet.title.clone(),
                            index,
                        },
                    })
                    .collect(),
            })
            .ok_or_else(|| SheetsError::not_found("Requested entity was not found."));
        Box::pin(async move { result })
    }

    fn get_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, SheetsResult<ValueRange>> {
        self.record("get_values");
        let result = self.with_sheet(spreadsheet_id, range, |sheet, area| ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: read_area(&sheet.rows, &area),
        });
        Box::pin(async move { result })
    }

    fn append_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>> {
        self.record("append_values");
        *self.last_input.lock().unwrap() = Some(input);
        let result = self.with_sheet(spreadsheet_id, range, |sheet, area| {
            let next_row = sheet
                .rows
                .iter()
                .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
                .map_or(0, |last| last + 1)
                .max(area.first_row);
            write_at(&mut sheet.rows, next_row, area.first_col, &values.values);
        });
        Box::pin(async move { result })
    }

    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>> {
        self.record("update_values");
        *self.last_input.lock().unwrap() = Some(input);
        let result = self.with_sheet(spreadsheet_id, range, |sheet, area| {
            write_at(&mut sheet.rows, area.first_row, area.first_col, &values.values);
        });
        Box::pin(async move { result })
    }
}

/// Copies an area out, dropping trailing empty cells and rows like the API.
fn read_area(rows: &CellGrid, area: &Area) -> CellGrid {
    let end_row = area
        .last_row
        .map_or(rows.len(), |last| (last + 1).min(rows.len()));

    let mut out: CellGrid = rows
        .get(area.first_row..end_row)
        .unwrap_or_default()
        .iter()
        .map(|row| {
            let end_col = area
                .last_col
                .map_or(row.len(), |last| (last + 1).min(row.len()));
            let mut cells = row
                .get(area.first_col..end_col)
                .unwrap_or_default()
                .to_vec();
            while cells.last().is_some_and(CellValue::is_empty) {
                cells.pop();
            }
            cells
        })
        .collect();

    while out.last().is_some_and(Vec::is_empty) {
        out.pop();
    }
    out
}

fn write_at(rows: &mut CellGrid, first_row: usize, first_col: usize, values: &CellGrid) {
    for (i, source) in values.iter().enumerate() {
        let r = first_row + i;
        if rows.len() <= r {
            rows.resize(r + 1, Vec::new());
        }
        let target = &mut rows[r];
        for (j, value) in source.iter().enumerate() {
            let c = first_col + j;
            if target.len() <= c {
                target.resize(c + 1, CellValue::Text(String::new()));
            }
            target[c] = value.clone();
        }
    }
}

/// Splits `range` into an optional sheet title and the addressed area.
fn parse_range(range: &str) -> Option<(Option<String>, Area)> {
    match range.rsplit_once('!') {
        Some((title, cells)) => Some((Some(unquote(title)), parse_area(cells)?)),
        None => match parse_area(range) {
            Some(area) => Some((None, area)),
            None => Some((Some(unquote(range)), Area::WHOLE)),
        },
    }
}

fn unquote(title: &str) -> String {
    title
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .map_or_else(|| title.to_string(), |t| t.replace("''", "'"))
}

fn parse_area(cells: &str) -> Option<Area> {
    let (start, end) = match cells.split_once(':') {
        Some((start, end)) => (parse_cell(start)?, Some(parse_cell(end)?)),
        None => (parse_cell(cells)?, None),
    };

    let (last_col, last_row) = match end {
        Some(end) => end,
        None => start,
    };
    Some(Area {
        first_row: start.1.unwrap_or(0),
        first_col: start.0.unwrap_or(0),
        last_row,
        last_col,
    })
}

/// Parses `B3`, `B` or `3` into zero-based (column, row).
fn parse_cell(cell: &str) -> Option<(Option<usize>, Option<usize>)> {
    let split = cell
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() && digits.is_empty() {
        return None;
    }

    let col = if letters.is_empty() {
        None
    } else {
        let n = letters
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1));
        Some(n - 1)
    };

    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        Some(n.checked_sub(1)?)
    };

    Some((col, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cells() {
        assert_eq!(parse_cell("A1"), Some((Some(0), Some(0))));
        assert_eq!(parse_cell("AA10"), Some((Some(26), Some(9))));
        assert_eq!(parse_cell("B"), Some((Some(1), None)));
        assert_eq!(parse_cell("A0"), None);
        assert_eq!(parse_cell("Sheet"), None);
    }

    #[test]
    fn parse_ranges() {
        let (title, area) = parse_range("'My Sheet'!A2:B").unwrap();
        assert_eq!(title.as_deref(), Some("My Sheet"));
        assert_eq!(
            area,
            Area {
                first_row: 1,
                first_col: 0,
                last_row: None,
                last_col: Some(1),
            }
        );

        let (title, area) = parse_range("Sheet1").unwrap();
        assert_eq!(title.as_deref(), Some("Sheet1"));
        assert_eq!(area, Area::WHOLE);

        let (title, _) = parse_range("C3").unwrap();
        assert_eq!(title, None);
    }
}
