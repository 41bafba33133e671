//! Range read and write commands.

use tokio::io::AsyncReadExt;
use tracing::error;

use sheetlink_core::{CellGrid, to_tsv};
use sheetlink_google::SpreadsheetClient;

use crate::cli::GridFormat;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Authorizes and returns a client for the configured credentials.
pub async fn connect(
    config: &ClientConfig,
    access_token: Option<String>,
) -> ClientResult<SpreadsheetClient> {
    let sheets_config = config
        .sheets_config(access_token)
        .map_err(ClientError::Config)?;

    SpreadsheetClient::connect(&sheets_config)
        .await
        .inspect_err(|e| error!("authorization failed: {}", e))
        .map_err(ClientError::from)
}

/// Print the values of a range.
pub async fn read(
    client: &SpreadsheetClient,
    spreadsheet_id: &str,
    range: &str,
    format: GridFormat,
) -> ClientResult<()> {
    let grid = client.read_range(spreadsheet_id, range).await?;
    print!("{}", render(&grid, format)?);
    Ok(())
}

/// Print a sheet addressed by position.
pub async fn read_sheet(
    client: &SpreadsheetClient,
    spreadsheet_id: &str,
    index: usize,
    cells: &str,
    format: GridFormat,
) -> ClientResult<()> {
    let grid = client
        .read_sheet_by_index(spreadsheet_id, index, cells)
        .await?;
    print!("{}", render(&grid, format)?);
    Ok(())
}

/// Append rows given as JSON.
pub async fn append(
    client: &SpreadsheetClient,
    spreadsheet_id: &str,
    range: &str,
    values: &str,
) -> ClientResult<()> {
    let grid = load_grid(values).await?;
    let rows = grid.len();
    client.append_data(spreadsheet_id, range, grid).await?;
    println!("Appended {} rows to {}", rows, range);
    Ok(())
}

/// Overwrite a range with rows given as JSON.
pub async fn update(
    client: &SpreadsheetClient,
    spreadsheet_id: &str,
    range: &str,
    values: &str,
) -> ClientResult<()> {
    let grid = load_grid(values).await?;
    let rows = grid.len();
    client.update_data(spreadsheet_id, range, grid).await?;
    println!("Updated {} with {} rows", range, rows);
    Ok(())
}

/// Reads the grid argument, taking it from stdin when it is `-`.
async fn load_grid(values: &str) -> ClientResult<CellGrid> {
    if values == "-" {
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        parse_grid(&input)
    } else {
        parse_grid(values)
    }
}

/// Parses a JSON array of rows, e.g. `[["a", 1, true]]`.
pub fn parse_grid(input: &str) -> ClientResult<CellGrid> {
    serde_json::from_str(input.trim()).map_err(|e| {
        ClientError::Input(format!(
            "expected a JSON array of rows like [[\"a\", \"b\"]]: {}",
            e
        ))
    })
}

/// Renders a grid for stdout.
pub fn render(grid: &CellGrid, format: GridFormat) -> ClientResult<String> {
    match format {
        GridFormat::Json => serde_json::to_string(grid)
            .map(|json| json + "\n")
            .map_err(|e| ClientError::Output(e.to_string())),
        GridFormat::Tsv => {
            let mut out = to_tsv(grid);
            if !out.is_empty() {
                out.push('\n');
            }
            Ok(out)
        }
    }
}
