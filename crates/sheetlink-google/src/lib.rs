//! Google Sheets access for sheetlink.
//!
//! This crate authorizes against Google and reads or writes spreadsheet
//! values:
//!
//! - [`SpreadsheetClient`] - The authorized handle exposing the read and write operations
//! - [`SheetsApi`] - The remote calls the client is built on, implemented by [`RestSheetsApi`]
//! - [`CredentialProvider`] - Bearer token sources (browser consent, token file, service account)
//! - [`SheetsError`] - Error types for all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  SpreadsheetClient   │  read_range / read_sheet_by_index
//! └──────────┬───────────┘  append_data / update_data
//!            │ SheetsApi
//!            ▼
//! ┌──────────────────────┐    ┌──────────────────────┐
//! │    RestSheetsApi     │───▶│  CredentialProvider  │
//! └──────────┬───────────┘    └──────────┬───────────┘
//!            │                           │
//!            ▼                           ▼
//!   sheets.googleapis.com      oauth2.googleapis.com
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sheetlink_google::{SheetsConfig, SpreadsheetClient};
//!
//! async fn first_rows(id: &str) -> sheetlink_google::SheetsResult<()> {
//!     let config = SheetsConfig::new("client_secret.json", SheetsConfig::default_data_store_dir());
//!     let client = SpreadsheetClient::connect(&config).await?;
//!     let grid = client.read_sheet_by_index(id, 0, "A1:E10").await?;
//!     println!("{}", sheetlink_core::to_tsv(&grid));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod rest;
pub mod spreadsheet;
pub mod tokens;

#[cfg(test)]
mod fake;
#[cfg(test)]
mod test_server;

// Re-export main types at crate root
pub use api::{SheetsApi, Spreadsheet, ValueInputOption, ValueRange};
pub use config::{ClientSecrets, CredentialSource, SheetsConfig};
pub use credentials::{
    AuthorizedUser, BoxFuture, CredentialProvider, InstalledAppFlow, ServiceAccount, StaticToken,
};
pub use error::{SheetsError, SheetsErrorCode, SheetsResult};
pub use rest::RestSheetsApi;
pub use spreadsheet::{SpreadsheetClient, sheet_range};
pub use tokens::{FileTokenStore, TokenInfo};
