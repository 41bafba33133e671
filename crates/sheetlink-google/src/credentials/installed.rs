//! Interactive installed-application credentials.

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ClientSecrets, SheetsConfig};
use crate::error::{SheetsError, SheetsErrorCode, SheetsResult};
use crate::oauth::OAuthClient;
use crate::tokens::{FileTokenStore, TokenInfo};

use super::{BoxFuture, CredentialProvider};

/// Credentials obtained through browser consent and cached on disk.
///
/// Construction is the authorization step: [`InstalledAppFlow::authorize`]
/// either reuses the stored credential for the configured user or runs the
/// consent flow, blocking until the redirect arrives.
#[derive(Debug)]
pub struct InstalledAppFlow {
    oauth: OAuthClient,
    store: FileTokenStore,
    user_id: String,
    tokens: Mutex<TokenInfo>,
}

impl InstalledAppFlow {
    /// Loads the client secrets and authorizes the configured user.
    ///
    /// # Errors
    ///
    /// Fails if the secrets cannot be read, the credential store is
    /// unreadable, or the consent flow fails.
    pub async fn authorize(config: &SheetsConfig, http_client: reqwest::Client) -> SheetsResult<Self> {
        let secrets = ClientSecrets::from_file(&config.client_secret_path)?;
        secrets.validate().map_err(|e| {
            SheetsError::configuration(format!(
                "invalid client secrets {}: {}",
                config.client_secret_path.display(),
                e
            ))
        })?;

        let oauth = OAuthClient::new(secrets, http_client, config);
        let store = FileTokenStore::new(&config.data_store_dir);

        let tokens = match Self::reuse_stored(&oauth, &store, config).await? {
            Some(tokens) => tokens,
            None => {
                let tokens = oauth.authorize(&config.scopes).await?;
                store.store(&config.user_id, &tokens)?;
                info!("authorization for {:?} stored", config.user_id);
                tokens
            }
        };

        Ok(Self {
            oauth,
            store,
            user_id: config.user_id.clone(),
            tokens: Mutex::new(tokens),
        })
    }

    /// Returns the stored credential if it can still be used.
    ///
    /// An expired access token is refreshed right away so a revoked refresh
    /// token is detected at startup; in that case the stale file is removed
    /// and `None` is returned so the consent flow runs again.
    async fn reuse_stored(
        oauth: &OAuthClient,
        store: &FileTokenStore,
        config: &SheetsConfig,
    ) -> SheetsResult<Option<TokenInfo>> {
        let Some(mut tokens) = store.load(&config.user_id)? else {
            return Ok(None);
        };

        if !tokens.is_usable(&config.scopes) {
            info!("stored credential lacks scopes or a refresh token, re-authorizing");
            return Ok(None);
        }

        if !tokens.is_expired() {
            debug!("reusing stored credential");
            return Ok(Some(tokens));
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            return Ok(None);
        };

        match oauth.refresh(&refresh_token).await {
            Ok(response) => {
                tokens.apply_refresh(
                    response.access_token,
                    response.expires_in,
                    response.refresh_token,
                );
                store.store(&config.user_id, &tokens)?;
                Ok(Some(tokens))
            }
            Err(e) if e.code() == SheetsErrorCode::AuthenticationFailed => {
                warn!("stored credential rejected: {}", e);
                store.delete(&config.user_id)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the user key the credential is stored under.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn current_token(&self) -> SheetsResult<String> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            SheetsError::authentication("access token expired and no refresh token is stored")
        })?;

        debug!("refreshing expired access token");
        let response = self.oauth.refresh(&refresh_token).await?;
        tokens.apply_refresh(
            response.access_token,
            response.expires_in,
            response.refresh_token,
        );
        self.store.store(&self.user_id, &tokens)?;

        Ok(tokens.access_token.clone())
    }
}

impl CredentialProvider for InstalledAppFlow {
    fn name(&self) -> &str {
        "installed"
    }

    fn access_token(&self) -> BoxFuture<'_, SheetsResult<String>> {
        Box::pin(self.current_token())
    }
}
