//! Errors surfaced by the `sheetlink` binary.

use std::fmt;

use sheetlink_google::SheetsError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug)]
pub enum ClientError {
    /// Config file missing a setting, unreadable, or not valid TOML.
    Config(String),
    /// Anything reported by the Sheets client, authorization included.
    Sheets(SheetsError),
    Io(std::io::Error),
    /// A values argument that is not a JSON array of rows.
    Input(String),
    /// A result that could not be rendered for stdout.
    Output(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {}", msg),
            Self::Sheets(err) => fmt::Display::fmt(err, f),
            Self::Io(err) => write!(f, "i/o: {}", err),
            Self::Input(msg) => write!(f, "bad values: {}", msg),
            Self::Output(msg) => write!(f, "cannot render output: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sheets(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Config(_) | Self::Input(_) | Self::Output(_) => None,
        }
    }
}

impl From<SheetsError> for ClientError {
    fn from(err: SheetsError) -> Self {
        Self::Sheets(err)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
