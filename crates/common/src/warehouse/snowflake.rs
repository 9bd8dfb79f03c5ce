//! Snowflake over its JSON REST endpoints: password login for a session
//! token, then statement execution. Statements that outlive the server's
//! synchronous window are polled until ready, and large results are
//! assembled from their inline rowset plus the listed chunks.

use super::Warehouse;
use crate::config::{self, Credentials};
use crate::error::ExecutionError;
use crate::numeric::coerce_str;
use crate::table::{Cell, Column, ColumnKind, ResultTable};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const CLIENT_APP_ID: &str = "squid-dashboard";

/// Response codes meaning the session token is no longer valid.
const SESSION_EXPIRED_CODES: [&str; 2] = ["390112", "390114"];

/// Response codes meaning the statement is still running; `getResultUrl` says where to poll.
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

const POLL_INITIAL: Duration = Duration::from_millis(250);
const POLL_MAX: Duration = Duration::from_secs(5);

/// Headers for chunk downloads when the response carries only a `qrmk` key.
const SSE_ALGORITHM_HEADER: &str = "x-amz-server-side-encryption-customer-algorithm";
const SSE_KEY_HEADER: &str = "x-amz-server-side-encryption-customer-key";

pub struct SnowflakeClient {
    http: reqwest::Client,
    base_url: String,
    account: String,
    database: String,
    schema: String,
    compute: String,
    role: Option<String>,
    credentials: Credentials,
    timeout_secs: u64,
    token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    #[serde(default)]
    chunks: Vec<ChunkRef>,
    #[serde(default)]
    qrmk: Option<String>,
    #[serde(default)]
    chunk_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    get_result_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkRef {
    url: String,
    #[serde(default)]
    row_count: Option<usize>,
}

/// Where a statement stands after one round-trip.
enum Progress {
    Ready(QueryData),
    Running(String),
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl SnowflakeClient {
    pub fn new(
        settings: &config::Warehouse,
        credentials: Credentials,
    ) -> Result<Self, ExecutionError> {
        let account = credentials
            .account
            .clone()
            .unwrap_or_else(|| settings.account.clone());
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{account}.snowflakecomputing.com"));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account,
            database: settings.database.clone(),
            schema: settings.schema.clone(),
            compute: settings.compute.clone(),
            role: settings.role.clone(),
            credentials,
            timeout_secs: settings.timeout_secs,
            token: RwLock::new(None),
        })
    }

    pub fn login_url(&self) -> Result<Url, ExecutionError> {
        let mut url = self.endpoint("/session/v1/login-request")?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("databaseName", &self.database);
            qp.append_pair("schemaName", &self.schema);
            qp.append_pair("warehouse", &self.compute);
            if let Some(role) = &self.role {
                qp.append_pair("roleName", role);
            }
        }
        Ok(url)
    }

    pub fn query_url(&self) -> Result<Url, ExecutionError> {
        self.endpoint("/queries/v1/query-request")
    }

    fn endpoint(&self, path: &str) -> Result<Url, ExecutionError> {
        Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| ExecutionError::Connection(format!("invalid warehouse url: {e}")))
    }

    fn transport_error(&self, err: &reqwest::Error) -> ExecutionError {
        if err.is_timeout() {
            ExecutionError::Timeout(self.timeout_secs)
        } else {
            ExecutionError::Connection(err.to_string())
        }
    }

    async fn login(&self) -> Result<String, ExecutionError> {
        let body = json!({
            "data": {
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
                "ACCOUNT_NAME": self.account,
                "LOGIN_NAME": self.credentials.user,
                "PASSWORD": self.credentials.password,
            }
        });
        let resp = self
            .http
            .post(self.login_url()?)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let envelope: Envelope<LoginData> = self.read_envelope(resp).await?;
        if !envelope.success {
            return Err(ExecutionError::Authentication(
                envelope
                    .message
                    .unwrap_or_else(|| "login rejected".to_string()),
            ));
        }
        envelope
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| ExecutionError::Authentication("login returned no token".to_string()))
    }

    async fn session_token(&self) -> Result<String, ExecutionError> {
        let cached = self.token.read().await.clone();
        if let Some(token) = cached {
            return Ok(token);
        }
        let mut slot = self.token.write().await;
        if let Some(token) = slot.clone() {
            return Ok(token);
        }
        let token = self.login().await?;
        tracing::info!(account = %self.account, "warehouse session opened");
        *slot = Some(token.clone());
        drop(slot);
        Ok(token)
    }

    async fn read_envelope<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Envelope<T>, ExecutionError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExecutionError::Authentication(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ExecutionError::Connection(format!("HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| self.transport_error(&e))?;
        serde_json::from_str(&body).map_err(|e| ExecutionError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Warehouse for SnowflakeClient {
    async fn execute(&self, sql: &str) -> Result<ResultTable, ExecutionError> {
        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        let token = self.session_token().await?;
        let resp = self
            .http
            .post(self.query_url()?)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, auth_header(&token))
            .json(&json!({ "sqlText": sql, "asyncExec": false, "sequenceId": 1 }))
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let mut progress = self.progress(resp).await?;
        let mut delay = POLL_INITIAL;
        let data = loop {
            match progress {
                Progress::Ready(data) => break data,
                Progress::Running(result_url) => {
                    if Instant::now() + delay > deadline {
                        return Err(ExecutionError::Timeout(self.timeout_secs));
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(POLL_MAX);
                    tracing::debug!(%result_url, "statement still running");
                    progress = self.poll(&result_url, &token).await?;
                }
            }
        };

        let chunk_rows = self.fetch_chunks(&data).await?;
        decode(data, chunk_rows)
    }
}

impl SnowflakeClient {
    /// Classify a query or result-poll response.
    async fn progress(&self, resp: reqwest::Response) -> Result<Progress, ExecutionError> {
        let envelope = match self.read_envelope::<QueryData>(resp).await {
            Err(e @ ExecutionError::Authentication(_)) => {
                *self.token.write().await = None;
                return Err(e);
            }
            other => other?,
        };
        let code = envelope.code.unwrap_or_default();
        if QUERY_IN_PROGRESS_CODES.contains(&code.as_str()) {
            return envelope
                .data
                .and_then(|d| d.get_result_url)
                .map(Progress::Running)
                .ok_or_else(|| {
                    ExecutionError::Decode("running statement has no result url".to_string())
                });
        }
        if !envelope.success {
            let message = envelope.message.unwrap_or_default();
            if SESSION_EXPIRED_CODES.contains(&code.as_str()) {
                *self.token.write().await = None;
                return Err(ExecutionError::Authentication(message));
            }
            return Err(ExecutionError::Query { code, message });
        }
        envelope
            .data
            .map(Progress::Ready)
            .ok_or_else(|| ExecutionError::Decode("response has no data".to_string()))
    }

    async fn poll(&self, result_url: &str, token: &str) -> Result<Progress, ExecutionError> {
        let url = if result_url.starts_with("http") {
            Url::parse(result_url)
                .map_err(|e| ExecutionError::Decode(format!("invalid result url: {e}")))?
        } else {
            self.endpoint(result_url)?
        };
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, auth_header(token))
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        self.progress(resp).await
    }

    /// Download the rows of every chunk after the inline rowset, in order.
    async fn fetch_chunks(&self, data: &QueryData) -> Result<Vec<Vec<Value>>, ExecutionError> {
        let mut rows = Vec::new();
        for (i, chunk) in data.chunks.iter().enumerate() {
            let mut req = self.http.get(&chunk.url);
            match (&data.chunk_headers, &data.qrmk) {
                (Some(headers), _) if !headers.is_empty() => {
                    for (name, value) in headers {
                        req = req.header(name.as_str(), value.as_str());
                    }
                }
                (_, Some(key)) => {
                    req = req
                        .header(SSE_ALGORITHM_HEADER, "AES256")
                        .header(SSE_KEY_HEADER, key.as_str());
                }
                _ => {}
            }
            let resp = req.send().await.map_err(|e| self.transport_error(&e))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ExecutionError::Connection(format!(
                    "result chunk {i}: HTTP {status}"
                )));
            }
            let body = resp.bytes().await.map_err(|e| self.transport_error(&e))?;
            let part = parse_chunk(&body)?;
            if let Some(expected) = chunk.row_count {
                if expected != part.len() {
                    return Err(ExecutionError::Decode(format!(
                        "result chunk {i} has {} rows, expected {expected}",
                        part.len()
                    )));
                }
            }
            rows.extend(part);
        }
        Ok(rows)
    }
}

fn auth_header(token: &str) -> String {
    format!("Snowflake Token=\"{token}\"")
}

/// A chunk body is a comma-separated run of JSON row arrays without the
/// enclosing brackets. Gzip bodies are inflated by the HTTP client when the
/// response declares its encoding.
pub(crate) fn parse_chunk(body: &[u8]) -> Result<Vec<Vec<Value>>, ExecutionError> {
    if body.starts_with(&[0x1f, 0x8b]) {
        return Err(ExecutionError::Decode(
            "result chunk is gzip data without a content encoding".to_string(),
        ));
    }
    let text = std::str::from_utf8(body).map_err(|e| ExecutionError::Decode(e.to_string()))?;
    let rows = text.trim().trim_end_matches(',');
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&format!("[{rows}]")).map_err(|e| ExecutionError::Decode(e.to_string()))
}

/// Turn a row type description plus string rows into a typed table. The
/// inline rowset comes first, then the rows of any downloaded chunks.
pub(crate) fn decode(
    data: QueryData,
    chunk_rows: Vec<Vec<Value>>,
) -> Result<ResultTable, ExecutionError> {
    if data.rowtype.is_empty() {
        return Err(ExecutionError::Decode(
            "response describes no columns".to_string(),
        ));
    }
    let columns: Vec<Column> = data
        .rowtype
        .iter()
        .map(|r| Column::new(r.name.clone(), column_kind(&r.kind)))
        .collect();
    let rows = data
        .rowset
        .iter()
        .chain(&chunk_rows)
        .map(|row| {
            row.iter()
                .zip(&columns)
                .map(|(value, column)| decode_cell(value, column.kind))
                .collect()
        })
        .collect();
    Ok(ResultTable::new(columns, rows))
}

fn column_kind(warehouse_type: &str) -> ColumnKind {
    match warehouse_type.to_ascii_lowercase().as_str() {
        "fixed" | "real" => ColumnKind::Number,
        "date" | "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz" => ColumnKind::Timestamp,
        _ => ColumnKind::Text,
    }
}

fn decode_cell(value: &Value, kind: ColumnKind) -> Cell {
    let text = match value {
        Value::Null => return Cell::Null,
        Value::String(s) => s.as_str(),
        Value::Number(n) if kind == ColumnKind::Number => {
            return n.as_f64().into();
        }
        other => return Cell::Text(other.to_string()),
    };
    match kind {
        ColumnKind::Number => coerce_str(text).into(),
        ColumnKind::Timestamp => parse_instant(text).map_or(Cell::Null, Cell::Timestamp),
        ColumnKind::Text => Cell::Text(text.to_string()),
    }
}

/// Dates arrive as days since the epoch, timestamps as fractional epoch
/// seconds, optionally followed by a timezone offset.
fn parse_instant(text: &str) -> Option<NaiveDateTime> {
    let head = text.split_whitespace().next()?;
    if let Some((secs, frac)) = head.split_once('.') {
        let secs: i64 = secs.parse().ok()?;
        let nanos: u32 = format!("{frac:0<9}").get(..9)?.parse().ok()?;
        return DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc());
    }
    let days: i64 = head.parse().ok()?;
    NaiveDate::from_ymd_opt(1970, 1, 1)?
        .checked_add_signed(TimeDelta::try_days(days)?)?
        .and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> config::Warehouse {
        config::Warehouse {
            base_url: Some("https://example.test/".to_string()),
            account: "acme".to_string(),
            database: "AXELAR".to_string(),
            schema: "AXELSCAN".to_string(),
            compute: "COMPUTE_WH".to_string(),
            role: Some("ANALYST".to_string()),
            timeout_secs: 30,
            secrets_path: "config/secrets.toml".to_string(),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            user: "reader".to_string(),
            password: "hunter2".to_string(),
            account: None,
        }
    }

    #[test]
    fn test_login_url_carries_session_context() {
        let client = SnowflakeClient::new(&settings(), credentials()).unwrap();
        let url = client.login_url().unwrap();
        assert_eq!(url.path(), "/session/v1/login-request");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("databaseName".to_string(), "AXELAR".to_string())));
        assert!(pairs.contains(&("warehouse".to_string(), "COMPUTE_WH".to_string())));
        assert!(pairs.contains(&("roleName".to_string(), "ANALYST".to_string())));
        assert_eq!(
            client.query_url().unwrap().as_str(),
            "https://example.test/queries/v1/query-request"
        );
    }

    #[test]
    fn test_default_base_url_from_account() {
        let mut s = settings();
        s.base_url = None;
        let mut c = credentials();
        c.account = Some("xy12345.us-east-1".to_string());
        let client = SnowflakeClient::new(&s, c).unwrap();
        assert!(client
            .query_url()
            .unwrap()
            .as_str()
            .starts_with("https://xy12345.us-east-1.snowflakecomputing.com/"));
    }

    #[test]
    fn test_decode_typed_rowset() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": true,
            "data": {
                "rowtype": [
                    {"name": "Date", "type": "timestamp_ntz"},
                    {"name": "Route", "type": "text"},
                    {"name": "Bridges", "type": "fixed"},
                    {"name": "Volume", "type": "real"},
                    {"name": "Day", "type": "date"}
                ],
                "rowset": [
                    ["1672531200.000000000", "ethereum➡osmosis", "42", "1234.5", "19358"],
                    [null, "arbitrum➡base", "7", null, null]
                ]
            }
        }))
        .unwrap();
        let table = decode(envelope.data.unwrap(), Vec::new()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns()[0].kind, ColumnKind::Timestamp);
        assert_eq!(table.cell(0, "Date").unwrap().to_string(), "2023-01-01");
        assert_eq!(table.cell(0, "Day").unwrap().to_string(), "2023-01-01");
        assert_eq!(table.numbers("Bridges").unwrap(), vec![Some(42.0), Some(7.0)]);
        assert_eq!(table.numbers("Volume").unwrap(), vec![Some(1234.5), None]);
        assert!(table.cell(1, "Date").unwrap().is_null());
    }

    #[test]
    fn test_unparseable_number_is_missing() {
        assert_eq!(
            decode_cell(&json!("not a number"), ColumnKind::Number),
            Cell::Null
        );
        assert_eq!(decode_cell(&json!(3), ColumnKind::Number), Cell::Number(3.0));
    }

    #[test]
    fn test_timezone_suffix_is_ignored() {
        let ts = parse_instant("1672531200.5 1440").unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), "2023-01-01 00:00:00.500");
    }

    #[test]
    fn test_inline_rows_precede_chunk_rows() {
        let data: QueryData = serde_json::from_value(json!({
            "rowtype": [{"name": "Bridges", "type": "fixed"}],
            "rowset": [["1"], ["2"]],
            "qrmk": "a2V5",
            "chunks": [{"url": "https://chunks.example.test/0", "rowCount": 2}]
        }))
        .unwrap();
        assert_eq!(data.chunks[0].row_count, Some(2));
        assert_eq!(data.qrmk.as_deref(), Some("a2V5"));
        let chunk = parse_chunk(b"[\"3\"],\n[\"4\"]").unwrap();
        let table = decode(data, chunk).unwrap();
        assert_eq!(
            table.numbers("Bridges").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_chunk_body_edge_cases() {
        assert!(parse_chunk(b"  \n").unwrap().is_empty());
        assert_eq!(parse_chunk(b"[\"a\", null],").unwrap().len(), 1);
        assert!(matches!(
            parse_chunk(&[0x1f, 0x8b, 0x08, 0x00]),
            Err(ExecutionError::Decode(_))
        ));
    }

    #[test]
    fn test_running_statement_has_no_columns() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": true,
            "code": "333334",
            "data": {"queryId": "01ab", "getResultUrl": "/queries/01ab/result"}
        }))
        .unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.get_result_url.as_deref(), Some("/queries/01ab/result"));
        assert!(matches!(
            decode(data, Vec::new()),
            Err(ExecutionError::Decode(_))
        ));
    }

    #[test]
    fn test_failed_envelope_parses() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": false,
            "code": "002003",
            "message": "Object does not exist",
            "data": null
        }))
        .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.code.as_deref(), Some("002003"));
    }
}
