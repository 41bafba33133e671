//! Sheets API v4 over HTTPS.

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{SheetsApi, Spreadsheet, ValueInputOption, ValueRange};
use crate::config::SheetsConfig;
use crate::credentials::{BoxFuture, CredentialProvider};
use crate::error::{SheetsError, SheetsResult};

/// Metadata fields requested when resolving sheet titles.
const SPREADSHEET_FIELDS: &str = "spreadsheetId,sheets.properties";

/// Builds the HTTP client shared by the OAuth flow and the API client.
pub fn http_client(config: &SheetsConfig) -> SheetsResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(config.application_name.as_str())
        .build()
        .map_err(|e| {
            SheetsError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
        })
}

/// REST implementation of [`SheetsApi`].
#[derive(Clone)]
pub struct RestSheetsApi {
    http_client: reqwest::Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for RestSheetsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSheetsApi")
            .field("api_base", &self.api_base)
            .field("credentials", &self.credentials.name())
            .finish()
    }
}

impl RestSheetsApi {
    /// Creates a client that authenticates every request with `credentials`.
    pub fn new(
        http_client: reqwest::Client,
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.api_base,
            urlencoding::encode(spreadsheet_id)
        )
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/values/{}{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range),
            suffix
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> SheetsResult<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Sends a request and returns the raw body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> SheetsResult<String> {
        let response = self.authorized(request).await?.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            SheetsError::network(message).with_source(e)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SheetsError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        Ok(body)
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SheetsResult<T> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            SheetsError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    async fn fetch_spreadsheet(&self, spreadsheet_id: &str) -> SheetsResult<Spreadsheet> {
        let url = self.spreadsheet_url(spreadsheet_id);
        debug!("GET {}", url);
        let request = self
            .http_client
            .get(&url)
            .query(&[("fields", SPREADSHEET_FIELDS)]);
        self.execute_json(request).await
    }

    async fn fetch_values(&self, spreadsheet_id: &str, range: &str) -> SheetsResult<ValueRange> {
        let url = self.values_url(spreadsheet_id, range, "");
        debug!("GET {}", url);
        self.execute_json(self.http_client.get(&url)).await
    }

    async fn post_append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
    ) -> SheetsResult<()> {
        let url = self.values_url(spreadsheet_id, range, ":append");
        debug!("POST {} ({} rows)", url, values.values.len());
        let request = self
            .http_client
            .post(&url)
            .query(&[("valueInputOption", input.as_str())])
            .json(values);
        self.execute(request).await.map(|_| ())
    }

    async fn put_update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
    ) -> SheetsResult<()> {
        let url = self.values_url(spreadsheet_id, range, "");
        debug!("PUT {} ({} rows)", url, values.values.len());
        let request = self
            .http_client
            .put(&url)
            .query(&[("valueInputOption", input.as_str())])
            .json(values);
        self.execute(request).await.map(|_| ())
    }
}

impl SheetsApi for RestSheetsApi {
    fn get_spreadsheet<'a>(
        &'a self,
        spreadsheet_id: &'a str,
    ) -> BoxFuture<'a, SheetsResult<Spreadsheet>> {
        Box::pin(self.fetch_spreadsheet(spreadsheet_id))
    }

    fn get_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, SheetsResult<ValueRange>> {
        Box::pin(self.fetch_values(spreadsheet_id, range))
    }

    fn append_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>> {
        Box::pin(self.post_append(spreadsheet_id, range, values, input))
    }

    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a ValueRange,
        input: ValueInputOption,
    ) -> BoxFuture<'a, SheetsResult<()>> {
        Box::pin(self.put_update(spreadsheet_id, range, values, input))
    }
}

/// Google's JSON error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Maps a non-2xx response to an error, keeping the API's own message.
fn error_from_response(status: StatusCode, body: &str) -> SheetsError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({})", envelope.error.message, code),
            None => envelope.error.message,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body.to_string(),
    };

    let error = match status {
        StatusCode::BAD_REQUEST => SheetsError::bad_request(message),
        StatusCode::UNAUTHORIZED => SheetsError::authentication(message),
        StatusCode::FORBIDDEN => SheetsError::authorization(message),
        StatusCode::NOT_FOUND => SheetsError::not_found(message),
        StatusCode::TOO_MANY_REQUESTS => SheetsError::rate_limited(message),
        _ => SheetsError::server(message),
    };
    error.with_status(status.as_u16())
}
