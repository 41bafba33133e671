//! Client configuration and OAuth client secrets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SheetsError, SheetsResult};

/// OAuth 2.0 client secrets for an installed application.
///
/// This is the registered application's identity, downloaded from the
/// Google Cloud Console. It is not a user credential.
#[derive(Debug, Clone)]
pub struct ClientSecrets {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
}

/// Structure of Google's client secrets JSON file.
///
/// Supports the Cloud Console layout with an `installed` or `web` section
/// and a flat layout with the two fields at the root.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<NestedSecrets>,
    web: Option<NestedSecrets>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedSecrets {
    client_id: String,
    client_secret: String,
}

impl ClientSecrets {
    /// Creates new client secrets.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads client secrets from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> SheetsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::configuration(format!(
                "failed to read client secrets {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses client secrets from a JSON string.
    pub fn from_json(json: &str) -> SheetsResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            SheetsError::configuration(format!("failed to parse client secrets JSON: {}", e))
        })?;

        if let Some(nested) = file.installed.or(file.web) {
            return Ok(Self::new(nested.client_id, nested.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(SheetsError::configuration(
            "client secrets must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    /// Checks that the secrets look like a registered Google client.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Where the client gets its access tokens from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialSource {
    /// Browser consent with a loopback redirect, tokens cached in the data store.
    #[default]
    Interactive,
    /// An `authorized_user` JSON file holding a refresh token.
    AuthorizedUser(PathBuf),
    /// A service account key JSON file.
    ServiceAccount(PathBuf),
    /// A fixed bearer token. Never refreshed.
    StaticToken(String),
}

/// Configuration for [`SpreadsheetClient`](crate::SpreadsheetClient).
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Path to the client secrets JSON document.
    pub client_secret_path: PathBuf,

    /// Directory holding one cached credential file per user.
    pub data_store_dir: PathBuf,

    /// Key under which the credential is stored. Defaults to `"user"`.
    pub user_id: String,

    /// How access tokens are obtained.
    pub credential_source: CredentialSource,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Port of the loopback listener for the authorization redirect.
    pub callback_port: u16,

    /// Path the authorization server redirects to.
    pub callback_path: String,

    /// How long to wait for the redirect. `None` waits indefinitely.
    pub callback_timeout: Option<Duration>,

    /// Try to open the consent page in a browser.
    pub open_browser: bool,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Application name sent as the user agent.
    pub application_name: String,

    /// Base URL of the Sheets REST API.
    pub api_base: String,

    /// Authorization endpoint.
    pub auth_url: String,

    /// Token endpoint.
    pub token_url: String,
}

impl SheetsConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read/write access to all of the user's spreadsheets.
    pub const SPREADSHEETS_SCOPE: &'static str = "https://www.googleapis.com/auth/spreadsheets";

    /// Default loopback port for the authorization redirect.
    pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

    /// Default loopback path for the authorization redirect.
    pub const DEFAULT_CALLBACK_PATH: &'static str = "/Callback";

    /// Default key for the stored credential.
    pub const DEFAULT_USER_ID: &'static str = "user";

    pub const DEFAULT_API_BASE: &'static str = "https://sheets.googleapis.com/v4";
    pub const DEFAULT_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Creates a configuration from the two required settings.
    pub fn new(client_secret_path: impl Into<PathBuf>, data_store_dir: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            data_store_dir: data_store_dir.into(),
            user_id: Self::DEFAULT_USER_ID.to_string(),
            credential_source: CredentialSource::Interactive,
            scopes: vec![Self::SPREADSHEETS_SCOPE.to_string()],
            callback_port: Self::DEFAULT_CALLBACK_PORT,
            callback_path: Self::DEFAULT_CALLBACK_PATH.to_string(),
            callback_timeout: None,
            open_browser: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            application_name: format!("sheetlink/{}", env!("CARGO_PKG_VERSION")),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            auth_url: Self::DEFAULT_AUTH_URL.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
        }
    }

    /// Returns the default token store directory.
    pub fn default_data_store_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetlink")
            .join("tokens")
    }

    /// Sets the user key for the stored credential.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the credential source.
    pub fn with_credential_source(mut self, source: CredentialSource) -> Self {
        self.credential_source = source;
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the loopback callback port.
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Sets the loopback callback path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Sets how long to wait for the authorization redirect.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Enables or disables opening a browser.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Overrides the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Overrides the OAuth token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Returns the redirect URI the loopback listener answers on.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.callback_port, self.callback_path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SheetsResult<()> {
        if self.scopes.is_empty() {
            return Err(SheetsError::configuration(
                "at least one OAuth scope is required",
            ));
        }

        if !self.callback_path.starts_with('/') {
            return Err(SheetsError::configuration(format!(
                "callback path must start with '/': {}",
                self.callback_path
            )));
        }

        if self.user_id.is_empty() || self.user_id.contains(['/', '\\']) {
            return Err(SheetsError::configuration(format!(
                "invalid credential user id: {:?}",
                self.user_id
            )));
        }

        if self.credential_source == CredentialSource::Interactive
            && self.data_store_dir.as_os_str().is_empty()
        {
            return Err(SheetsError::configuration(
                "a token data store directory is required",
            ));
        }

        Ok(())
    }
}
