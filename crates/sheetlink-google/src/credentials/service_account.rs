//! Service account credentials (JWT bearer grant, RFC 7523).

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SheetsConfig;
use crate::error::{SheetsError, SheetsResult};
use crate::oauth::request_token;
use crate::tokens::TokenInfo;

use super::{BoxFuture, CredentialProvider};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion. Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Service account credentials.
///
/// Each token request signs a fresh RS256 assertion with the account's
/// private key; no refresh token is involved.
pub struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
    token_url: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    cached: Mutex<Option<TokenInfo>>,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("key_id", &self.key_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Reads a service account key JSON file.
    pub fn from_file(
        path: impl AsRef<Path>,
        config: &SheetsConfig,
        http_client: reqwest::Client,
    ) -> SheetsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::configuration(format!(
                "failed to read service account key {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content, config, http_client)
    }

    /// Parses a service account key JSON document.
    pub fn from_json(
        json: &str,
        config: &SheetsConfig,
        http_client: reqwest::Client,
    ) -> SheetsResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            SheetsError::configuration(format!("failed to parse service account key: {}", e))
        })?;

        if let Some(kind) = key.kind.as_deref()
            && kind != "service_account"
        {
            return Err(SheetsError::configuration(format!(
                "expected a service_account key file, got type {:?}",
                kind
            )));
        }

        let key_pair = parse_private_key(&key.private_key)?;

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            key_pair,
            rng: SystemRandom::new(),
            token_url: key.token_uri.unwrap_or_else(|| config.token_url.clone()),
            scopes: config.scopes.clone(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    /// Returns the service account's email address.
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Builds a signed assertion issued at `iat` (seconds since the epoch).
    fn signed_assertion(&self, iat: i64) -> SheetsResult<String> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.key_id.as_deref(),
        };
        let claims = JwtClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let signing_input = format!(
            "{}.{}",
            encode_segment(&header)?,
            encode_segment(&claims)?
        );

        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| SheetsError::internal("failed to sign JWT assertion"))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    async fn current_token(&self) -> SheetsResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tokens) = cached.as_ref()
            && !tokens.is_expired()
        {
            return Ok(tokens.access_token.clone());
        }

        debug!("requesting access token for {}", self.client_email);
        let assertion = self.signed_assertion(Utc::now().timestamp())?;
        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];
        let response = request_token(
            &self.http_client,
            &self.token_url,
            &params,
            "service account token request",
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

impl CredentialProvider for ServiceAccount {
    fn name(&self) -> &str {
        "service_account"
    }

    fn access_token(&self) -> BoxFuture<'_, SheetsResult<String>> {
        Box::pin(self.current_token())
    }
}

/// Decodes the PKCS#8 PEM block Google puts in `private_key`.
fn parse_private_key(pem: &str) -> SheetsResult<RsaKeyPair> {
    let der = rustls_pemfile::pkcs8_private_keys(&mut pem.as_bytes())
        .next()
        .ok_or_else(|| SheetsError::configuration("service account key holds no PKCS#8 private key"))?
        .map_err(|e| {
            SheetsError::configuration(format!("failed to decode private key PEM: {}", e))
        })?;

    RsaKeyPair::from_pkcs8(der.secret_pkcs8_der()).map_err(|e| {
        SheetsError::configuration(format!("service account private key rejected: {}", e))
    })
}

fn encode_segment<T: Serialize>(value: &T) -> SheetsResult<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| SheetsError::internal(format!("failed to encode JWT segment: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
