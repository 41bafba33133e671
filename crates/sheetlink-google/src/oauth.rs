//! OAuth 2.0 authorization code flow for installed applications.
//!
//! # Flow Overview
//!
//! 1. Generate a PKCE code verifier, its SHA-256 challenge and a random state
//! 2. Bind the loopback listener (`localhost:8080/Callback` by default) on
//!    both `127.0.0.1` and `::1`, since browsers may resolve `localhost` to
//!    either
//! 3. Open the user's browser on the consent page, forcing the consent
//!    prompt and asking for offline access so a refresh token is issued
//! 4. Wait for the redirect and pull the authorization code out of it
//! 5. Exchange the code (with the verifier) for access and refresh tokens
//!
//! The listener waits indefinitely unless a callback timeout is configured.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ClientSecrets, SheetsConfig};
use crate::error::{SheetsError, SheetsResult};
use crate::tokens::TokenInfo;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// A callback connection that sends no request line within this window is dropped.
const REQUEST_LINE_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Successful</h1>\
    <p>You can close this window and return to the application.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Failed</h1>\
    <p>You can close this window.</p></body></html>";

const NOT_FOUND_PAGE: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// OAuth client for the installed-application flow.
#[derive(Debug)]
pub struct OAuthClient {
    secrets: ClientSecrets,
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
    callback_port: u16,
    callback_path: String,
    redirect_uri: String,
    callback_timeout: Option<Duration>,
    open_browser: bool,
}

impl OAuthClient {
    /// Creates a new OAuth client for the given application secrets.
    pub fn new(
        secrets: ClientSecrets,
        http_client: reqwest::Client,
        config: &SheetsConfig,
    ) -> Self {
        Self {
            secrets,
            http_client,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            callback_port: config.callback_port,
            callback_path: config.callback_path.clone(),
            redirect_uri: config.redirect_uri(),
            callback_timeout: config.callback_timeout,
            open_browser: config.open_browser,
        }
    }

    /// Runs the interactive consent flow and returns the granted tokens.
    ///
    /// # Errors
    ///
    /// Fails if the callback port is taken, the user denies access, the
    /// redirect carries a mismatched state, the optional timeout elapses, or
    /// the code exchange is rejected.
    pub async fn authorize(&self, scopes: &[String]) -> SheetsResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let listeners = bind_loopback(self.callback_port).await?;

        let auth_url = pkce.build_auth_url(
            &self.auth_url,
            &self.secrets.client_id,
            &self.redirect_uri,
            scopes,
        )?;

        info!("starting OAuth consent flow");
        debug!("authorization URL: {}", auth_url);

        let opened = self.open_browser && open::that(auth_url.as_str()).is_ok();
        if !opened {
            if self.open_browser {
                warn!("failed to open browser");
            }
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let wait = wait_for_callback(listeners, &self.callback_path);
        let callback = match self.callback_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| SheetsError::authentication("OAuth callback timeout"))??,
            None => wait.await?,
        };

        if callback.state != pkce.state {
            return Err(SheetsError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&callback.code, &pkce.verifier, scopes)
            .await
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        scopes: &[String],
    ) -> SheetsResult<TokenInfo> {
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response =
            request_token(&self.http_client, &self.token_url, &params, "token exchange").await?;

        if response.refresh_token.is_none() {
            warn!("token endpoint returned no refresh token");
        }

        // Granular consent lets the user untick scopes; keep what was granted.
        let granted = match response.scope {
            Some(ref scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => scopes.to_vec(),
        };

        info!("successfully obtained tokens");
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted,
        ))
    }

    /// Obtains a fresh access token using a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> SheetsResult<TokenResponse> {
        refresh_access_token(
            &self.http_client,
            &self.token_url,
            &self.secrets,
            refresh_token,
        )
        .await
    }
}

/// Uses the `refresh_token` grant against `token_url`.
pub(crate) async fn refresh_access_token(
    http_client: &reqwest::Client,
    token_url: &str,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> SheetsResult<TokenResponse> {
    let params = [
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    let response = request_token(http_client, token_url, &params, "token refresh").await?;
    info!("refreshed access token");
    Ok(response)
}

/// Posts a form to the token endpoint and decodes the token response.
pub(crate) async fn request_token(
    http_client: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
    what: &str,
) -> SheetsResult<TokenResponse> {
    let response = http_client
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| SheetsError::network(format!("{} request failed: {}", what, e)).with_source(e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SheetsError::network(format!("failed to read response: {}", e)))?;

    if !status.is_success() {
        let detail = serde_json::from_str::<OAuthErrorBody>(&body).ok();
        let message = match detail {
            Some(ref d) if d.error == "invalid_grant" => format!(
                "{} rejected: grant revoked or expired{}",
                what,
                d.description_suffix()
            ),
            Some(ref d) => format!("{} failed: {}{}", what, d.error, d.description_suffix()),
            None => format!("{} failed: {}", what, body),
        };
        return Err(SheetsError::authentication(message).with_status(status.as_u16()));
    }

    serde_json::from_str(&body)
        .map_err(|e| SheetsError::invalid_response(format!("invalid token response: {}", e)))
}

/// The pieces of the redirect we care about.
#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
    state: String,
}

/// Binds the callback port on the IPv4 loopback and, when available, IPv6.
async fn bind_loopback(port: u16) -> SheetsResult<Vec<TcpListener>> {
    let v4 = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .map_err(|e| {
            SheetsError::configuration(format!(
                "failed to bind callback listener on port {}: {}",
                port, e
            ))
            .with_source(e)
        })?;
    let port = v4.local_addr().map(|addr| addr.port()).unwrap_or(port);
    debug!("callback listener bound on 127.0.0.1:{}", port);

    let mut listeners = vec![v4];
    match TcpListener::bind((Ipv6Addr::LOCALHOST, port)).await {
        Ok(v6) => {
            debug!("callback listener bound on [::1]:{}", port);
            listeners.push(v6);
        }
        Err(e) => debug!("IPv6 loopback unavailable: {}", e),
    }
    Ok(listeners)
}

/// Accepts connections until one carries the authorization redirect.
///
/// Every connection is served on its own task, so a socket that never sends
/// a request cannot hold up the redirect.
async fn wait_for_callback(
    listeners: Vec<TcpListener>,
    callback_path: &str,
) -> SheetsResult<Callback> {
    let (tx, mut rx) = mpsc::channel(1);
    let mut acceptors = JoinSet::new();
    for listener in listeners {
        acceptors.spawn(accept_loop(listener, callback_path.to_string(), tx.clone()));
    }
    drop(tx);

    let result = rx
        .recv()
        .await
        .unwrap_or_else(|| Err(SheetsError::internal("callback listener stopped")));
    acceptors.abort_all();
    result
}

async fn accept_loop(
    listener: TcpListener,
    callback_path: String,
    tx: mpsc::Sender<SheetsResult<Callback>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                let _ = tx
                    .send(Err(SheetsError::internal(format!(
                        "failed to accept callback connection: {}",
                        e
                    ))))
                    .await;
                return;
            }
        };
        debug!("callback connection from {}", peer);

        let tx = tx.clone();
        let callback_path = callback_path.clone();
        tokio::spawn(async move {
            if let Some(result) = handle_connection(stream, &callback_path).await {
                let _ = tx.send(result).await;
            }
        });
    }
}

/// Answers one HTTP request on the callback listener.
///
/// Returns `None` for requests that are not the redirect (favicon fetches,
/// preconnects that never send anything) so the caller keeps waiting.
async fn handle_connection(
    mut stream: TcpStream,
    callback_path: &str,
) -> Option<SheetsResult<Callback>> {
    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&mut stream);
        let read = tokio::time::timeout(REQUEST_LINE_TIMEOUT, reader.read_line(&mut request_line));
        match read.await {
            Ok(Ok(n)) if n > 0 => {}
            _ => return None,
        }
    }

    let outcome = parse_callback_request(&request_line, callback_path);
    let page = match outcome {
        None => NOT_FOUND_PAGE,
        Some(Ok(_)) => SUCCESS_PAGE,
        Some(Err(_)) => FAILURE_PAGE,
    };

    let _ = stream.write_all(page.as_bytes()).await;
    let _ = stream.flush().await;
    outcome
}

/// Parses a request line such as `GET /Callback?code=...&state=... HTTP/1.1`.
fn parse_callback_request(request_line: &str, callback_path: &str) -> Option<SheetsResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let target = parts.next()?;

    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;
    if url.path() != callback_path {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(SheetsError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match code {
        Some(code) => Some(Ok(Callback {
            code,
            state: state.unwrap_or_default(),
        })),
        None => Some(Err(SheetsError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

/// PKCE flow state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of the verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the authorization URL.
    ///
    /// Always asks for offline access and forces the consent prompt so a
    /// refresh token is issued on every authorization.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> SheetsResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            auth_endpoint,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| {
            SheetsError::configuration(format!(
                "invalid authorization endpoint {}: {}",
                auth_endpoint, e
            ))
        })
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated scopes actually granted.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body from the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorBody {
    fn description_suffix(&self) -> String {
        self.error_description
            .as_deref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;

    const AUTH: &str = "https://accounts.google.com/o/oauth2/v2/auth";

    #[test]
    fn pkce_verifier_length() {
        // 32 bytes base64url without padding = 43 characters
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_vector() {
        // RFC 7636 appendix B
        let challenge = PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn pkce_state_is_random() {
        assert_ne!(PkceFlow::new().state, PkceFlow::new().state);
    }

    #[test]
    fn auth_url_forces_consent_and_offline() {
        let flow = PkceFlow::new();
        let url = flow
            .build_auth_url(
                AUTH,
                "test-client.apps.googleusercontent.com",
                "http://localhost:8080/Callback",
                &[SheetsConfig::SPREADSHEETS_SCOPE.to_string()],
            )
            .unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert!(url.as_str().starts_with(AUTH));
        assert_eq!(get("redirect_uri"), Some("http://localhost:8080/Callback"));
        assert_eq!(
            get("scope"),
            Some("https://www.googleapis.com/auth/spreadsheets")
        );
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("prompt"), Some("consent"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("state"), Some(flow.state.as_str()));
    }

    #[test]
    fn auth_url_rejects_bad_endpoint() {
        let err = PkceFlow::new()
            .build_auth_url("not a url", "id", "http://localhost:8080/Callback", &[])
            .unwrap_err();
        assert_eq!(err.code(), crate::SheetsErrorCode::ConfigurationError);
    }

    #[test]
    fn parse_callback_with_code() {
        let line = "GET /Callback?state=abc&code=4%2F0AY0e HTTP/1.1\r\n";
        let callback = parse_callback_request(line, "/Callback").unwrap().unwrap();
        assert_eq!(
            callback,
            Callback {
                code: "4/0AY0e".to_string(),
                state: "abc".to_string()
            }
        );
    }

    #[test]
    fn parse_callback_ignores_other_paths() {
        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1", "/Callback").is_none());
        assert!(parse_callback_request("POST /Callback?code=x HTTP/1.1", "/Callback").is_none());
        assert!(parse_callback_request("GET /callback?code=x HTTP/1.1", "/Callback").is_none());
        assert!(parse_callback_request("", "/Callback").is_none());
    }

    #[test]
    fn parse_callback_denied() {
        let err = parse_callback_request("GET /Callback?error=access_denied HTTP/1.1", "/Callback")
            .unwrap()
            .unwrap_err();
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn parse_callback_without_code() {
        let result = parse_callback_request("GET /Callback?state=abc HTTP/1.1", "/Callback").unwrap();
        assert!(result.is_err());
    }

    async fn loopback() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn listener_answers_redirect() {
        let (listener, addr) = loopback().await;
        let waiter = tokio::spawn(wait_for_callback(vec![listener], "/Callback"));

        // A stray request first; the listener must keep waiting.
        let mut stray = TcpStream::connect(addr).await.unwrap();
        stray
            .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let mut browser = TcpStream::connect(addr).await.unwrap();
        browser
            .write_all(b"GET /Callback?code=c0de&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let callback = waiter.await.unwrap().unwrap();
        assert_eq!(callback.code, "c0de");
        assert_eq!(callback.state, "s1");
    }

    #[tokio::test]
    async fn silent_connection_does_not_block_redirect() {
        let (listener, addr) = loopback().await;
        let waiter = tokio::spawn(wait_for_callback(vec![listener], "/Callback"));

        // Browsers preconnect to localhost and may never send a request.
        let _preconnect = TcpStream::connect(addr).await.unwrap();

        let mut browser = TcpStream::connect(addr).await.unwrap();
        browser
            .write_all(b"GET /Callback?code=c0de&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let callback = tokio::time::timeout(Duration::from_secs(3), waiter)
            .await
            .expect("redirect handled while another connection is idle")
            .unwrap()
            .unwrap();
        assert_eq!(callback.code, "c0de");
    }

    #[tokio::test]
    async fn loopback_listeners_share_port() {
        let listeners = bind_loopback(0).await.unwrap();
        let addrs: Vec<_> = listeners.iter().map(|l| l.local_addr().unwrap()).collect();

        assert!(addrs[0].is_ipv4());
        assert_ne!(addrs[0].port(), 0);
        assert!(addrs.iter().all(|a| a.port() == addrs[0].port()));
        assert!(addrs.len() == 1 || addrs[1].is_ipv6());
    }

    fn client_for(token_base: &str) -> OAuthClient {
        let config = SheetsConfig::new("", "").with_token_url(format!("{}/token", token_base));
        OAuthClient::new(
            ClientSecrets::new("test.apps.googleusercontent.com", "s"),
            reqwest::Client::new(),
            &config,
        )
    }

    #[tokio::test]
    async fn exchange_keeps_granted_scopes() {
        let (base, requests) = test_server::serve(vec![(
            "200 OK",
            r#"{"access_token": "ya29.a", "refresh_token": "1//r", "expires_in": 3599, "scope": "openid"}"#,
        )])
        .await;

        let wanted = vec![SheetsConfig::SPREADSHEETS_SCOPE.to_string()];
        let tokens = client_for(&base)
            .exchange_code("c0de", "verifier", &wanted)
            .await
            .unwrap();

        assert_eq!(tokens.scopes, vec!["openid".to_string()]);
        assert!(!tokens.is_usable(&wanted));

        let request = requests.await.unwrap().remove(0);
        assert!(request.starts_with("POST /token HTTP/1.1"));
        assert!(request.contains("grant_type=authorization_code"));
        assert!(request.contains("code_verifier=verifier"));
        assert!(request.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2FCallback"));
    }

    #[tokio::test]
    async fn exchange_without_scope_assumes_requested() {
        let (base, _requests) = test_server::serve(vec![(
            "200 OK",
            r#"{"access_token": "ya29.a", "refresh_token": "1//r", "expires_in": 3599}"#,
        )])
        .await;

        let wanted = vec![SheetsConfig::SPREADSHEETS_SCOPE.to_string()];
        let tokens = client_for(&base)
            .exchange_code("c0de", "verifier", &wanted)
            .await
            .unwrap();
        assert!(tokens.is_usable(&wanted));
    }

    #[test]
    fn oauth_error_body_suffix() {
        let body: OAuthErrorBody = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
        )
        .unwrap();
        assert_eq!(body.error, "invalid_grant");
        assert_eq!(
            body.description_suffix(),
            " (Token has been expired or revoked.)"
        );
    }
}
