//! Pre-provisioned `authorized_user` credentials.
//!
//! The file format is the one `gcloud auth application-default login`
//! writes: client id and secret plus a long-lived refresh token.

use std::path::Path;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{ClientSecrets, SheetsConfig};
use crate::error::{SheetsError, SheetsResult};
use crate::oauth::refresh_access_token;
use crate::tokens::TokenInfo;

use super::{BoxFuture, CredentialProvider};

#[derive(Debug, Deserialize)]
struct AuthorizedUserFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

/// Refresh-token credentials read from a file. Never opens a browser.
#[derive(Debug)]
pub struct AuthorizedUser {
    secrets: ClientSecrets,
    refresh_token: String,
    token_url: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    cached: Mutex<Option<TokenInfo>>,
}

impl AuthorizedUser {
    /// Reads an `authorized_user` JSON file.
    pub fn from_file(
        path: impl AsRef<Path>,
        config: &SheetsConfig,
        http_client: reqwest::Client,
    ) -> SheetsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::configuration(format!(
                "failed to read authorized user file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content, config, http_client)
    }

    /// Parses an `authorized_user` JSON document.
    pub fn from_json(
        json: &str,
        config: &SheetsConfig,
        http_client: reqwest::Client,
    ) -> SheetsResult<Self> {
        let file: AuthorizedUserFile = serde_json::from_str(json).map_err(|e| {
            SheetsError::configuration(format!("failed to parse authorized user file: {}", e))
        })?;

        if let Some(kind) = file.kind.as_deref()
            && kind != "authorized_user"
        {
            return Err(SheetsError::configuration(format!(
                "expected an authorized_user credential file, got type {:?}",
                kind
            )));
        }

        Ok(Self {
            secrets: ClientSecrets::new(file.client_id, file.client_secret),
            refresh_token: file.refresh_token,
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    async fn current_token(&self) -> SheetsResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tokens) = cached.as_ref()
            && !tokens.is_expired()
        {
            return Ok(tokens.access_token.clone());
        }

        debug!("requesting access token for authorized user");
        let response = refresh_access_token(
            &self.http_client,
            &self.token_url,
            &self.secrets,
            &self.refresh_token,
        )
        .await?;

        let tokens = TokenInfo::new(
            response.access_token,
            None,
            response.expires_in,
            self.scopes.clone(),
        );
        let access_token = tokens.access_token.clone();
        *cached = Some(tokens);
        Ok(access_token)
    }
}

impl CredentialProvider for AuthorizedUser {
    fn name(&self) -> &str {
        "authorized_user"
    }

    fn access_token(&self) -> BoxFuture<'_, SheetsResult<String>> {
        Box::pin(self.current_token())
    }
}
