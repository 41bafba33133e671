//! Error types for spreadsheet operations.
//!
//! Every failure, whether it happens while authorizing or during a read or
//! write, is reported as a [`SheetsError`]. Errors are never retried or
//! reclassified here; callers decide what to do with them.

use std::fmt;
use thiserror::Error;

/// What kind of failure a [`SheetsError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetsErrorCode {
    /// The credential was rejected or could not be renewed (401).
    AuthenticationFailed,
    /// The credential lacks permission for the spreadsheet (403).
    AuthorizationFailed,
    /// The request never got an HTTP response.
    NetworkError,
    /// Quota exhausted (429).
    RateLimited,
    /// 5xx, or any status without a more specific code.
    ServerError,
    /// A 2xx body that did not parse.
    InvalidResponse,
    /// Spreadsheet or range not found (404).
    NotFound,
    /// Request was rejected as invalid (400), e.g. a malformed range.
    BadRequest,
    /// Unreadable secrets or key files, or invalid settings.
    ConfigurationError,
    /// The requested sheet index does not exist in the spreadsheet.
    SheetIndexOutOfRange,
    InternalError,
}

impl SheetsErrorCode {
    /// Stable snake_case name, for logs and scripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::SheetIndexOutOfRange => "sheet_index_out_of_range",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for SheetsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while authorizing or talking to the Sheets API.
#[derive(Debug, Error)]
pub struct SheetsError {
    code: SheetsErrorCode,
    message: String,
    /// HTTP status returned by the remote API, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SheetsError {
    pub fn new(code: SheetsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    // One constructor per code.

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::ConfigurationError, message)
    }

    /// Creates an out-of-range sheet index error.
    pub fn sheet_index_out_of_range(index: usize, sheet_count: usize) -> Self {
        Self::new(
            SheetsErrorCode::SheetIndexOutOfRange,
            format!(
                "sheet index {} out of range (spreadsheet has {} sheets)",
                index, sheet_count
            ),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SheetsErrorCode::InternalError, message)
    }

    /// Records the HTTP status that produced this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the underlying error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> SheetsErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from an API response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for SheetsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// A specialized Result type for sheets operations.
pub type SheetsResult<T> = Result<T, SheetsError>;
