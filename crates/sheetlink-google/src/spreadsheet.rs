//! The authorized spreadsheet client.

use std::sync::Arc;

use sheetlink_core::CellGrid;
use tracing::{debug, info};

use crate::api::{SheetsApi, ValueInputOption, ValueRange};
use crate::config::SheetsConfig;
use crate::credentials;
use crate::error::{SheetsError, SheetsResult};
use crate::rest::{RestSheetsApi, http_client};

/// Handle for reading and writing spreadsheet values.
///
/// A `SpreadsheetClient` only exists once authorization has succeeded;
/// [`connect`](Self::connect) is the single place credentials are
/// established. The handle is cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct SpreadsheetClient {
    api: Arc<dyn SheetsApi>,
}

impl std::fmt::Debug for SpreadsheetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpreadsheetClient").finish_non_exhaustive()
    }
}

impl SpreadsheetClient {
    /// Authorizes with the configured credentials and returns a client.
    ///
    /// With the interactive credential source this may open a browser and
    /// wait for the consent redirect, without a deadline unless
    /// `config.callback_timeout` is set.
    ///
    /// # Errors
    ///
    /// Any failure building the HTTP transport, loading secrets or completing
    /// authorization is returned; there is no retry.
    pub async fn connect(config: &SheetsConfig) -> SheetsResult<Self> {
        config.validate()?;

        let http = http_client(config)?;
        let provider = credentials::from_config(config, http.clone()).await?;
        info!("authorized with {} credentials", provider.name());

        let api = RestSheetsApi::new(http, config.api_base.clone(), provider);
        Ok(Self::with_api(Arc::new(api)))
    }

    /// Wraps an existing [`SheetsApi`] implementation.
    pub fn with_api(api: Arc<dyn SheetsApi>) -> Self {
        Self { api }
    }

    /// Reads the values of `range`.
    ///
    /// Returns an empty grid when the range holds no data.
    pub async fn read_range(&self, spreadsheet_id: &str, range: &str) -> SheetsResult<CellGrid> {
        debug!("reading {} from {}", range, spreadsheet_id);
        let value_range = self.api.get_values(spreadsheet_id, range).await?;
        Ok(value_range.values)
    }

    /// Reads a sheet addressed by its zero-based position in tab order.
    ///
    /// An empty `cells_range` reads the whole sheet; otherwise it is
    /// appended to the sheet title, as in `A2:B` → `Title!A2:B`. Sheet
    /// metadata is fetched on every call.
    ///
    /// # Errors
    ///
    /// Returns [`SheetIndexOutOfRange`](crate::SheetsErrorCode::SheetIndexOutOfRange)
    /// when the spreadsheet has no sheet at `sheet_index`.
    pub async fn read_sheet_by_index(
        &self,
        spreadsheet_id: &str,
        sheet_index: usize,
        cells_range: &str,
    ) -> SheetsResult<CellGrid> {
        let spreadsheet = self.api.get_spreadsheet(spreadsheet_id).await?;
        let title = spreadsheet.sheet_title(sheet_index).ok_or_else(|| {
            SheetsError::sheet_index_out_of_range(sheet_index, spreadsheet.sheets.len())
        })?;

        let range = sheet_range(title, cells_range);
        self.read_range(spreadsheet_id, &range).await
    }

    /// Appends `values` after the last row of the table in `range`.
    ///
    /// Values are stored literally; formulas are not evaluated.
    pub async fn append_data(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: CellGrid,
    ) -> SheetsResult<()> {
        debug!("appending {} rows to {}", values.len(), range);
        let body = ValueRange::rows(range, values);
        self.api
            .append_values(spreadsheet_id, range, &body, ValueInputOption::Raw)
            .await
    }

    /// Overwrites the cells of `range` with `values`.
    pub async fn update_data(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: CellGrid,
    ) -> SheetsResult<()> {
        debug!("updating {} with {} rows", range, values.len());
        let body = ValueRange::rows(range, values);
        self.api
            .update_values(spreadsheet_id, range, &body, ValueInputOption::Raw)
            .await
    }
}

/// Builds the range string for a whole sheet or a block of cells within it.
pub fn sheet_range(title: &str, cells_range: &str) -> String {
    if cells_range.is_empty() {
        title.to_string()
    } else {
        format!("{}!{}", title, cells_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SheetsErrorCode;
    use crate::fake::FakeSheets;
    use sheetlink_core::CellValue;

    const ID: &str = "sheet-id";

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    fn client(titles: &[&str]) -> (SpreadsheetClient, Arc<FakeSheets>) {
        let fake = Arc::new(FakeSheets::new().with_spreadsheet(ID, titles));
        (SpreadsheetClient::with_api(fake.clone()), fake)
    }

    #[test]
    fn sheet_range_formats() {
        assert_eq!(sheet_range("Class Data", ""), "Class Data");
        assert_eq!(sheet_range("Class Data", "A2:E"), "Class Data!A2:E");
    }

    #[tokio::test]
    async fn update_then_read_example() {
        let (client, _) = client(&["Sheet1"]);
        client
            .update_data(ID, "Sheet1!A1:B1", vec![row(&["a", "b"])])
            .await
            .unwrap();

        let grid = client.read_range(ID, "Sheet1!A1:B1").await.unwrap();
        assert_eq!(grid, vec![row(&["a", "b"])]);
    }

    #[tokio::test]
    async fn read_returns_last_write() {
        let (client, _) = client(&["Sheet1"]);
        client
            .update_data(ID, "Sheet1!B2:C3", vec![row(&["1", "2"]), row(&["3", "4"])])
            .await
            .unwrap();
        client
            .update_data(ID, "Sheet1!B2:C3", vec![row(&["5", "6"]), row(&["7", "8"])])
            .await
            .unwrap();

        let grid = client.read_range(ID, "Sheet1!B2:C3").await.unwrap();
        assert_eq!(grid, vec![row(&["5", "6"]), row(&["7", "8"])]);
    }

    #[tokio::test]
    async fn read_empty_range() {
        let (client, _) = client(&["Sheet1"]);
        let grid = client.read_range(ID, "Sheet1!A1:Z100").await.unwrap();
        assert!(grid.is_empty());
    }

    #[tokio::test]
    async fn read_sheet_by_index_whole_sheet() {
        let (client, _) = client(&["First", "Second"]);
        client
            .update_data(ID, "Second!A1:B2", vec![row(&["h1", "h2"]), row(&["v1", "v2"])])
            .await
            .unwrap();

        let by_index = client.read_sheet_by_index(ID, 1, "").await.unwrap();
        let by_title = client.read_range(ID, "Second").await.unwrap();
        assert_eq!(by_index, by_title);
        assert_eq!(by_index.len(), 2);
    }

    #[tokio::test]
    async fn read_sheet_by_index_cells() {
        let (client, _) = client(&["First", "Second"]);
        client
            .update_data(
                ID,
                "First!A1:C3",
                vec![
                    row(&["Name", "Score", "Note"]),
                    row(&["Ada", "9", "x"]),
                    row(&["Bob", "7", "y"]),
                ],
            )
            .await
            .unwrap();

        let by_index = client.read_sheet_by_index(ID, 0, "A2:B").await.unwrap();
        let by_title = client.read_range(ID, "First!A2:B").await.unwrap();
        assert_eq!(by_index, by_title);
        assert_eq!(by_index, vec![row(&["Ada", "9"]), row(&["Bob", "7"])]);
    }

    #[tokio::test]
    async fn read_sheet_by_index_makes_two_calls() {
        let (client, fake) = client(&["Sheet1"]);
        client.read_sheet_by_index(ID, 0, "").await.unwrap();
        client.read_sheet_by_index(ID, 0, "A1").await.unwrap();
        assert_eq!(
            fake.calls(),
            vec!["get_spreadsheet", "get_values", "get_spreadsheet", "get_values"]
        );
    }

    #[tokio::test]
    async fn read_sheet_by_index_out_of_range() {
        let (client, fake) = client(&["Only"]);
        let err = client.read_sheet_by_index(ID, 1, "").await.unwrap_err();
        assert_eq!(err.code(), SheetsErrorCode::SheetIndexOutOfRange);
        assert_eq!(fake.calls(), vec!["get_spreadsheet"]);
    }

    #[tokio::test]
    async fn append_keeps_existing_rows() {
        let (client, _) = client(&["Log"]);
        let original = vec![row(&["date", "event"]), row(&["mon", "start"])];
        client
            .update_data(ID, "Log!A1:B2", original.clone())
            .await
            .unwrap();

        let appended = vec![row(&["tue", "run"]), row(&["wed", "stop"])];
        client
            .append_data(ID, "Log!A1:B", appended.clone())
            .await
            .unwrap();

        let grid = client.read_range(ID, "Log").await.unwrap();
        assert_eq!(grid.len(), original.len() + appended.len());
        assert_eq!(&grid[..2], &original[..]);
        assert_eq!(&grid[2..], &appended[..]);
    }

    #[tokio::test]
    async fn append_to_empty_sheet() {
        let (client, _) = client(&["Log"]);
        client
            .append_data(ID, "Log", vec![row(&["first"])])
            .await
            .unwrap();
        assert_eq!(
            client.read_range(ID, "Log").await.unwrap(),
            vec![row(&["first"])]
        );
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let (client, _) = client(&["Sheet1"]);
        let values = vec![row(&["x", "y"]), row(&["z", "w"])];

        client
            .update_data(ID, "Sheet1!C3:D4", values.clone())
            .await
            .unwrap();
        let once = client.read_range(ID, "Sheet1").await.unwrap();

        client
            .update_data(ID, "Sheet1!C3:D4", values)
            .await
            .unwrap();
        let twice = client.read_range(ID, "Sheet1").await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn writes_are_sent_raw() {
        let (client, fake) = client(&["Sheet1"]);
        client
            .update_data(ID, "Sheet1!A1", vec![row(&["=1+1"])])
            .await
            .unwrap();
        assert_eq!(fake.last_input(), Some(ValueInputOption::Raw));
        assert_eq!(
            client.read_range(ID, "Sheet1!A1").await.unwrap(),
            vec![row(&["=1+1"])]
        );
    }

    #[tokio::test]
    async fn errors_propagate_unchanged() {
        let (client, _) = client(&["Sheet1"]);
        let err = client.read_range("other-id", "A1").await.unwrap_err();
        assert_eq!(err.code(), SheetsErrorCode::NotFound);

        let err = client.read_range(ID, "Nope!A1").await.unwrap_err();
        assert_eq!(err.code(), SheetsErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn connect_with_static_token() {
        let config = SheetsConfig::new("", "").with_credential_source(
            crate::CredentialSource::StaticToken("ya29.token".into()),
        );
        assert!(SpreadsheetClient::connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config() {
        let config = SheetsConfig::new("secret.json", "tokens").with_scopes(Vec::new());
        let err = SpreadsheetClient::connect(&config).await.unwrap_err();
        assert_eq!(err.code(), SheetsErrorCode::ConfigurationError);
    }
}
