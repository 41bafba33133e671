//! Credential providers.
//!
//! A [`CredentialProvider`] hands out bearer tokens for API requests. The
//! interactive browser flow is one implementation among several:
//!
//! - [`InstalledAppFlow`] - consent in a browser, loopback redirect, tokens
//!   cached in a [`FileTokenStore`](crate::FileTokenStore)
//! - [`AuthorizedUser`] - a pre-provisioned `authorized_user` JSON file
//! - [`ServiceAccount`] - a service account key, JWT bearer grant
//! - [`StaticToken`] - a fixed token, never refreshed

mod authorized_user;
mod installed;
mod service_account;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{CredentialSource, SheetsConfig};
use crate::error::SheetsResult;

pub use authorized_user::AuthorizedUser;
pub use installed::InstalledAppFlow;
pub use service_account::ServiceAccount;

/// A boxed future, so the provider traits stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of bearer tokens for API requests.
///
/// Implementations keep whatever token they hold fresh on their own; callers
/// ask for a token before every request and never see refresh logic.
pub trait CredentialProvider: Send + Sync {
    /// Short name for logs (e.g. "installed", "service_account").
    fn name(&self) -> &str;

    /// Returns a currently valid access token.
    ///
    /// # Errors
    ///
    /// Fails with an authentication error when the token cannot be renewed,
    /// for instance after the refresh token was revoked.
    fn access_token(&self) -> BoxFuture<'_, SheetsResult<String>>;
}

/// A fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Creates a provider that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticToken {
    fn name(&self) -> &str {
        "static"
    }

    fn access_token(&self) -> BoxFuture<'_, SheetsResult<String>> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}

/// Builds the provider selected by `config.credential_source`.
///
/// For the interactive source this runs (or reuses) the consent flow, so the
/// returned provider is already authorized.
pub async fn from_config(
    config: &SheetsConfig,
    http_client: reqwest::Client,
) -> SheetsResult<Arc<dyn CredentialProvider>> {
    let provider: Arc<dyn CredentialProvider> = match &config.credential_source {
        CredentialSource::Interactive => {
            Arc::new(InstalledAppFlow::authorize(config, http_client).await?)
        }
        CredentialSource::AuthorizedUser(path) => {
            Arc::new(AuthorizedUser::from_file(path, config, http_client)?)
        }
        CredentialSource::ServiceAccount(path) => {
            Arc::new(ServiceAccount::from_file(path, config, http_client)?)
        }
        CredentialSource::StaticToken(token) => Arc::new(StaticToken::new(token.clone())),
    };
    Ok(provider)
}
