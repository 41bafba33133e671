//! OAuth credential material and its file-backed store.
//!
//! The store keeps one JSON file per user key inside a directory, so a
//! granted credential survives restarts and the consent flow only runs when
//! nothing usable is cached.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SheetsError, SheetsResult};

/// Seconds shaved off the reported lifetime so tokens are renewed early.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth token set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires (already reduced by a safety margin).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token set from token endpoint data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Returns true if the token was granted all required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns true if the token can still be used, directly or via refresh.
    pub fn is_usable(&self, required_scopes: &[String]) -> bool {
        self.has_scopes(required_scopes) && (!self.is_expired() || self.refresh_token.is_some())
    }

    /// Replaces the access token after a refresh.
    ///
    /// Google may rotate the refresh token; a new one replaces the old.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(expiry_from_now);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.last_refresh = Utc::now();
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// Directory of credential files, one per user key.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file that holds the credential for `user`.
    pub fn path_for(&self, user: &str) -> PathBuf {
        self.dir.join(format!("{}.json", user))
    }

    /// Loads the credential for `user`, if one is stored.
    pub fn load(&self, user: &str) -> SheetsResult<Option<TokenInfo>> {
        let path = self.path_for(user);
        if !path.exists() {
            debug!("no stored credential at {:?}", path);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            SheetsError::configuration(format!("failed to read credential file: {}", e))
                .with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            SheetsError::configuration(format!(
                "failed to parse credential file {:?}: {}",
                path, e
            ))
        })?;

        info!("loaded stored credential from {:?}", path);
        Ok(Some(tokens))
    }

    /// Persists the credential for `user`.
    pub fn store(&self, user: &str, tokens: &TokenInfo) -> SheetsResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SheetsError::configuration(format!(
                "failed to create token directory {:?}: {}",
                self.dir, e
            ))
            .with_source(e)
        })?;

        let path = self.path_for(user);
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens).map_err(|e| {
            SheetsError::internal(format!("failed to serialize credential: {}", e))
        })?;

        fs::write(&temp_path, &content).map_err(|e| {
            SheetsError::configuration(format!("failed to write credential file: {}", e))
                .with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &path).map_err(|e| {
            SheetsError::configuration(format!("failed to rename credential file: {}", e))
                .with_source(e)
        })?;

        debug!("saved credential to {:?}", path);
        Ok(())
    }

    /// Removes the stored credential for `user`. Missing files are fine.
    pub fn delete(&self, user: &str) -> SheetsResult<()> {
        let path = self.path_for(user);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                SheetsError::configuration(format!("failed to remove credential file: {}", e))
                    .with_source(e)
            })?;
            info!("removed stored credential {:?}", path);
        }
        Ok(())
    }
}
