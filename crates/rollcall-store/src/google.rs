// SPDX-License-Identifier: Apache-2.0

use crate::{
    CellRows, ConnectionReport, SheetsBackend, SheetsCredentials, StoreError, StoreResult,
};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How the service interprets written strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Stored exactly as sent.
    #[default]
    Raw,
    /// Parsed as if typed into the UI (numbers, dates, formulas).
    UserEntered,
}

impl ValueInputOption {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::UserEntered => "USER_ENTERED",
        }
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        match input.trim().to_ascii_uppercase().as_str() {
            "RAW" => Ok(Self::Raw),
            "USER_ENTERED" => Ok(Self::UserEntered),
            other => Err(format!(
                "unsupported value input option {other:?}: expected RAW or USER_ENTERED"
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: CellRows,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    /// Omitted by the service when zero.
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Sheets v4 REST client authenticated as a service account.
pub struct GoogleSheetsBackend {
    credentials: SheetsCredentials,
    encoding_key: EncodingKey,
    api_base: String,
    token_uri: String,
    value_input: ValueInputOption,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsBackend {
    pub fn new(credentials: SheetsCredentials) -> StoreResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| StoreError::Configuration(format!("invalid service account key: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                StoreError::Configuration(format!("failed to build http client: {e}"))
            })?;
        Ok(Self {
            credentials,
            encoding_key,
            api_base: DEFAULT_API_BASE.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            value_input: ValueInputOption::default(),
            client,
            token: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_token_uri(mut self, uri: &str) -> Self {
        self.token_uri = uri.to_string();
        self
    }

    #[must_use]
    pub fn with_value_input(mut self, option: ValueInputOption) -> Self {
        self.value_input = option;
        self
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Configuration(format!("invalid sheets api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::Configuration("sheets api base cannot hold a path".to_string())
            })?
            .pop_if_empty()
            .push(&self.credentials.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str, suffix: &str) -> StoreResult<Url> {
        let target = format!("{range}{suffix}");
        self.url(&["values", target.as_str()])
    }

    fn signed_assertion(&self) -> StoreResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Configuration(format!("system clock before epoch: {e}")))?
            .as_secs();
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| StoreError::Configuration(format!("failed to sign token assertion: {e}")))
    }

    #[instrument(name = "sheets_access_token", skip(self))]
    async fn access_token(&self) -> StoreResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let assertion = self.signed_assertion()?;
        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Upstream(format!("token request failed: {e}")))?;
        let token: TokenResponse = decode_response(resp, "token exchange").await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        debug!(lifetime_secs = lifetime.as_secs(), "sheets access token refreshed");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(token.access_token)
    }

    async fn request(&self, method: Method, url: Url) -> StoreResult<RequestBuilder> {
        let token = self.access_token().await?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| StoreError::Upstream(format!("invalid access token: {e}")))?;
        Ok(self.client.request(method, url).header(AUTHORIZATION, bearer))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> StoreResult<T> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Upstream(format!("{what} failed: {e}")))?;
        decode_response(resp, what).await
    }

    async fn metadata(&self) -> StoreResult<SpreadsheetMetadata> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties(sheetId,title)");
        let req = self.request(Method::GET, url).await?;
        self.send(req, "spreadsheet metadata").await
    }
}

async fn decode_response<T>(resp: reqwest::Response, what: &str) -> StoreResult<T>
where
    T: DeserializeOwned,
{
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| StoreError::Upstream(format!("{what} body read failed: {e}")))?;
    if !status.is_success() {
        let detail = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.pointer("/error_description"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
        return Err(StoreError::Upstream(format!(
            "{what} failed status={}: {detail}",
            status.as_u16()
        )));
    }
    serde_json::from_slice(&body)
        .map_err(|e| StoreError::Parse(format!("{what} returned unreadable body: {e}")))
}

#[async_trait]
impl SheetsBackend for GoogleSheetsBackend {
    fn backend_tag(&self) -> &'static str {
        "google"
    }

    #[instrument(name = "sheets_get_range", skip(self))]
    async fn get_range(&self, range: &str) -> StoreResult<CellRows> {
        let url = self.values_url(range, "")?;
        let req = self.request(Method::GET, url).await?;
        let resp: ValueRangeResponse = self.send(req, "values.get").await?;
        Ok(resp.values)
    }

    #[instrument(name = "sheets_update_range", skip(self, rows), fields(rows = rows.len()))]
    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> StoreResult<()> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", self.value_input.as_str());
        let body = json!({"range": range, "majorDimension": "ROWS", "values": rows});
        let req = self.request(Method::PUT, url).await?.json(&body);
        let _: Value = self.send(req, "values.update").await?;
        Ok(())
    }

    #[instrument(name = "sheets_append_rows", skip(self, rows), fields(rows = rows.len()))]
    async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> StoreResult<Option<String>> {
        let mut url = self.values_url(range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", self.value_input.as_str())
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({"majorDimension": "ROWS", "values": rows});
        let req = self.request(Method::POST, url).await?.json(&body);
        let resp: AppendResponse = self.send(req, "values.append").await?;
        Ok(resp.updates.and_then(|u| u.updated_range))
    }

    #[instrument(name = "sheets_clear_range", skip(self))]
    async fn clear_range(&self, range: &str) -> StoreResult<()> {
        let url = self.values_url(range, ":clear")?;
        let req = self.request(Method::POST, url).await?.json(&json!({}));
        let _: Value = self.send(req, "values.clear").await?;
        Ok(())
    }

    #[instrument(name = "sheets_batch_delete_rows", skip(self))]
    async fn batch_delete_rows(&self, sheet_id: i64, start: u32, end: u32) -> StoreResult<()> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Configuration(format!("invalid sheets api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::Configuration("sheets api base cannot hold a path".to_string())
            })?
            .pop_if_empty()
            .push(&format!("{}:batchUpdate", self.credentials.spreadsheet_id));
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": start,
                        "endIndex": end,
                    }
                }
            }]
        });
        let req = self.request(Method::POST, url).await?.json(&body);
        let _: Value = self.send(req, "batchUpdate").await?;
        Ok(())
    }

    #[instrument(name = "sheets_sheet_id", skip(self))]
    async fn sheet_id(&self, sheet: &str) -> StoreResult<Option<i64>> {
        let meta = self.metadata().await?;
        Ok(meta
            .sheets
            .into_iter()
            .find(|s| s.properties.title == sheet)
            .map(|s| s.properties.sheet_id))
    }

    #[instrument(name = "sheets_check_connection", skip(self))]
    async fn check_connection(&self) -> StoreResult<ConnectionReport> {
        let meta = self.metadata().await?;
        Ok(ConnectionReport {
            title: meta.properties.map(|p| p.title).unwrap_or_default(),
            sheet_count: meta.sheets.len(),
        })
    }
}
