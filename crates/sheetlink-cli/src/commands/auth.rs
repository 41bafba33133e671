//! Authentication commands.

use tracing::info;

use sheetlink_google::rest::http_client;
use sheetlink_google::{CredentialSource, FileTokenStore, SheetsConfig, credentials};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Result of an authorization attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A usable credential was already stored; nothing was done.
    AlreadyAuthorized,
    /// A token was obtained from the named credential provider.
    Authorized(String),
}

/// Run the authorization flow for the configured credentials.
///
/// For the interactive source this opens the consent page unless a usable
/// credential is already stored; `force` discards the stored one first.
pub async fn run(
    config: &ClientConfig,
    access_token: Option<String>,
    force: bool,
) -> ClientResult<()> {
    let sheets_config = config
        .sheets_config(access_token)
        .map_err(ClientError::Config)?;

    if sheets_config.credential_source == CredentialSource::Interactive {
        println!("Starting Google Sheets authorization...");
        println!();
        println!("A browser window will open for you to authorize access.");
        println!("If the browser doesn't open, check the terminal for a URL to copy.");
        println!();
    }

    match authorize(&sheets_config, force).await? {
        AuthOutcome::AlreadyAuthorized => {
            println!("Already authorized with Google Sheets.");
            println!("Use --force to re-authorize.");
        }
        AuthOutcome::Authorized(provider) => {
            info!("authorization with {} credentials successful", provider);
            println!("Authorization successful!");
            if sheets_config.credential_source == CredentialSource::Interactive {
                let store = FileTokenStore::new(&sheets_config.data_store_dir);
                println!(
                    "Your credential has been saved to {}",
                    store.path_for(&sheets_config.user_id).display()
                );
            }
        }
    }

    Ok(())
}

/// Obtains an access token, reusing a stored credential unless `force` is set.
pub async fn authorize(config: &SheetsConfig, force: bool) -> ClientResult<AuthOutcome> {
    if config.credential_source == CredentialSource::Interactive {
        let store = FileTokenStore::new(&config.data_store_dir);
        if force {
            store.delete(&config.user_id)?;
        } else if let Some(tokens) = store.load(&config.user_id)?
            && tokens.is_usable(&config.scopes)
        {
            return Ok(AuthOutcome::AlreadyAuthorized);
        }
    }

    let provider = credentials::from_config(config, http_client(config)?).await?;
    provider.access_token().await?;
    Ok(AuthOutcome::Authorized(provider.name().to_string()))
}
