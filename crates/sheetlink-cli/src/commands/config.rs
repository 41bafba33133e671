//! `sheetlink config` subcommands.

use sheetlink_google::{ClientSecrets, CredentialSource};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Prints the effective configuration as TOML.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("cannot render config: {}", e)))?;
    println!("# {}", ClientConfig::default_path().display());
    print!("{}", rendered);
    Ok(())
}

/// Resolves the Google settings without authorizing.
///
/// For the interactive source the client secret file is also parsed.
pub fn validate(config: &ClientConfig, access_token: Option<String>) -> ClientResult<()> {
    let sheets = config
        .sheets_config(access_token)
        .map_err(ClientError::Config)?;

    if sheets.credential_source == CredentialSource::Interactive {
        ClientSecrets::from_file(&sheets.client_secret_path)?
            .validate()
            .map_err(|e| {
                ClientError::Config(format!(
                    "{}: {}",
                    sheets.client_secret_path.display(),
                    e
                ))
            })?;
    }

    println!("ok");
    Ok(())
}

pub fn path() -> ClientResult<()> {
    println!("{}", ClientConfig::default_path().display());
    Ok(())
}
