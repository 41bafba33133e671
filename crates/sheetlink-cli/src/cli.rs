//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// sheetlink - Read and write Google Sheets ranges
#[derive(Debug, Parser)]
#[command(name = "sheetlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SHEETLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Use this OAuth access token instead of the configured credentials
    #[arg(long, env = "SHEETLINK_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// How grids are printed
    #[arg(long, value_enum, default_value_t = GridFormat::Json)]
    pub format: GridFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format for cell grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GridFormat {
    /// A JSON array of rows
    Json,
    /// Tab-separated values, one row per line
    Tsv,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize access to Google Sheets and store the credential
    Auth {
        /// Discard the stored credential and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Read the values of a range (e.g. "Sheet1!A1:B2")
    Read {
        spreadsheet_id: String,
        range: String,
    },

    /// Read a sheet by its zero-based position
    ReadSheet {
        spreadsheet_id: String,
        index: usize,
        /// Cells within the sheet (e.g. "A2:B"); the whole sheet when omitted
        #[arg(default_value = "")]
        cells: String,
    },

    /// Append rows after the last row of the table in a range
    Append {
        spreadsheet_id: String,
        range: String,
        /// JSON array of rows, or "-" to read it from stdin
        values: String,
    },

    /// Overwrite the cells of a range
    Update {
        spreadsheet_id: String,
        range: String,
        /// JSON array of rows, or "-" to read it from stdin
        values: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
