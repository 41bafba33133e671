//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/sheetlink/config.toml` by default:
//!
//! ```toml
//! [security.google]
//! client_secret = "/path/to/client_secret.json"
//! data_store = "/path/to/tokens"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetlink_core::LogFormat;
use sheetlink_google::{CredentialSource, SheetsConfig};

/// Configuration for the sheetlink client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Log line format on stderr: `compact`, `pretty` or `json`.
    pub log_format: LogFormat,

    /// Credential settings.
    pub security: SecuritySettings,
}

/// The `[security]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Google settings.
    pub google: Option<GoogleSettings>,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetlink")
    }

    /// Builds the library configuration.
    ///
    /// An `access_token` overrides whatever credential source is configured.
    pub fn sheets_config(&self, access_token: Option<String>) -> Result<SheetsConfig, String> {
        match &self.security.google {
            Some(google) => google.to_sheets_config(access_token),
            None if access_token.is_some() => {
                GoogleSettings::default().to_sheets_config(access_token)
            }
            None => Err(missing_setting("client_secret")),
        }
    }
}

/// Which credential source `[security.google]` selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsKind {
    /// Browser consent with a cached token.
    #[default]
    Interactive,
    /// An `authorized_user` JSON file.
    AuthorizedUser,
    /// A service account key file.
    ServiceAccount,
}

/// Google Sheets settings (`[security.google]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Path to the OAuth client secret JSON from the Cloud Console.
    pub client_secret: Option<PathBuf>,

    /// Directory holding stored credentials.
    pub data_store: Option<PathBuf>,

    /// Key the credential is stored under.
    pub user: Option<String>,

    /// Credential source.
    pub credentials: CredentialsKind,

    /// Key file for the `authorized_user` and `service_account` sources.
    pub credentials_file: Option<PathBuf>,

    /// Loopback port for the authorization redirect.
    pub callback_port: Option<u16>,

    /// Path of the authorization redirect.
    pub callback_path: Option<String>,

    /// Seconds to wait for the redirect; unset waits forever.
    pub callback_timeout_secs: Option<u64>,

    /// Open the consent page in a browser.
    pub open_browser: Option<bool>,

    /// User agent sent with API requests.
    pub application_name: Option<String>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl GoogleSettings {
    /// Converts to library configuration.
    pub fn to_sheets_config(&self, access_token: Option<String>) -> Result<SheetsConfig, String> {
        let source = match (access_token, self.credentials) {
            (Some(token), _) => CredentialSource::StaticToken(token),
            (None, CredentialsKind::Interactive) => CredentialSource::Interactive,
            (None, CredentialsKind::AuthorizedUser) => {
                CredentialSource::AuthorizedUser(self.require_credentials_file()?)
            }
            (None, CredentialsKind::ServiceAccount) => {
                CredentialSource::ServiceAccount(self.require_credentials_file()?)
            }
        };

        let mut config = if source == CredentialSource::Interactive {
            let client_secret = self
                .client_secret
                .clone()
                .ok_or_else(|| missing_setting("client_secret"))?;
            let data_store = self
                .data_store
                .clone()
                .ok_or_else(|| missing_setting("data_store"))?;
            SheetsConfig::new(client_secret, data_store)
        } else {
            SheetsConfig::new(
                self.client_secret.clone().unwrap_or_default(),
                self.data_store
                    .clone()
                    .unwrap_or_else(SheetsConfig::default_data_store_dir),
            )
        };
        config = config.with_credential_source(source);

        if let Some(ref user) = self.user {
            config = config.with_user_id(user);
        }
        if let Some(port) = self.callback_port {
            config = config.with_callback_port(port);
        }
        if let Some(ref path) = self.callback_path {
            config = config.with_callback_path(path);
        }
        if let Some(secs) = self.callback_timeout_secs {
            config = config.with_callback_timeout(Some(Duration::from_secs(secs)));
        }
        if let Some(open) = self.open_browser {
            config = config.with_open_browser(open);
        }
        if let Some(ref name) = self.application_name {
            config = config.with_application_name(name);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate().map_err(|e| e.message().to_string())?;
        Ok(config)
    }

    fn require_credentials_file(&self) -> Result<PathBuf, String> {
        self.credentials_file
            .clone()
            .ok_or_else(|| missing_setting("credentials_file"))
    }
}

fn missing_setting(key: &str) -> String {
    format!(
        "{} is missing from [security.google] in {}:\n  \
         [security.google]\n  \
         client_secret = \"/path/to/client_secret.json\"\n  \
         data_store = \"/path/to/tokens\"",
        key,
        ClientConfig::default_path().display()
    )
}
