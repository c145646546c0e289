//! Snowflake connector over the REST session API
//!
//! A connection is one login session: `login-request` opens it, each
//! statement goes through `query-request`, and closing deletes the session.

use crate::config::{Credentials, SnowflakeSettings};
use crate::connection::{Connection, Connector, Dialect};
use crate::models::{Cell, Column, ColumnKind, ResultSet};
use crate::{Result, WarehouseError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const CLIENT_APP_ID: &str = "AssetWatch";
const NANOS_PER_SEC: u32 = 1_000_000_000;
// timestamp_tz offsets are sent as minutes + 1440
const TZ_OFFSET_BIAS: i64 = 1440;

// Returned with `getResultUrl` while a statement is still executing
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const RESULT_POLL_ATTEMPTS: u32 = 120;

/// Connector opening one Snowflake session per request
pub struct SnowflakeConnector {
    client: Client,
    settings: Arc<SnowflakeSettings>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    code: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    rowtype: Option<Vec<RowType>>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    #[serde(default)]
    chunks: Vec<Value>,
    query_id: Option<String>,
    get_result_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    scale: Option<i64>,
}

impl SnowflakeConnector {
    /// Create a connector. No network traffic happens until [`Connector::connect`].
    pub fn new(settings: SnowflakeSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/snowflake"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("AssetWatch/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            settings: Arc::new(settings),
        })
    }

    async fn login(&self, base_url: &str, creds: Credentials<'_>) -> Result<String> {
        let url = format!("{}/session/v1/login-request", base_url);

        let request_id = Uuid::new_v4().to_string();
        let mut params = vec![("request_id", request_id.as_str())];
        if let Some(ref warehouse) = self.settings.warehouse {
            params.push(("warehouse", warehouse.as_str()));
        }
        if let Some(ref database) = self.settings.database {
            params.push(("databaseName", database.as_str()));
        }
        if let Some(ref schema) = self.settings.schema {
            params.push(("schemaName", schema.as_str()));
        }

        let body = json!({
            "data": {
                "ACCOUNT_NAME": account_locator(creds.account),
                "LOGIN_NAME": creds.user,
                "PASSWORD": creds.password,
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
                "SESSION_PARAMETERS": { "JDBC_QUERY_RESULT_FORMAT": "JSON" },
            }
        });

        let response = self.client.post(&url).query(&params).json(&body).send().await?;
        let data: LoginData = require_data(read_envelope(response).await?)?;

        Ok(data.token)
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Snowflake
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let creds = self.settings.credentials()?;
        let base_url = self.settings.base_url(creds.account);

        debug!(account = creds.account, user = creds.user, "Opening Snowflake session");
        let token = self.login(&base_url, creds).await?;

        let auth = HeaderValue::from_str(&format!("Snowflake Token=\"{}\"", token))
            .map_err(|e| WarehouseError::Protocol(format!("invalid session token: {}", e)))?;

        Ok(Box::new(SnowflakeSession {
            client: self.client.clone(),
            base_url,
            auth,
            sequence: 0,
        }))
    }
}

/// An open Snowflake session
struct SnowflakeSession {
    client: Client,
    base_url: String,
    auth: HeaderValue,
    sequence: u64,
}

#[async_trait]
impl Connection for SnowflakeSession {
    async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.sequence += 1;
        let url = format!("{}/queries/v1/query-request", self.base_url);
        let request_id = Uuid::new_v4().to_string();

        let body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": self.sequence,
            "querySubmissionTime": chrono::Utc::now().timestamp_millis(),
        });

        let response = self
            .client
            .post(&url)
            .query(&[("requestId", request_id.as_str())])
            .header(AUTHORIZATION, self.auth.clone())
            .json(&body)
            .send()
            .await?;

        let mut envelope: Envelope<QueryData> = read_envelope(response).await?;
        let mut polls = 0;
        while let Some(path) = pending_result_url(&envelope)? {
            if polls == RESULT_POLL_ATTEMPTS {
                return Err(WarehouseError::Protocol(format!(
                    "query still running after {} polls",
                    polls
                )));
            }
            polls += 1;

            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
            debug!(path = %path, polls, "Polling for Snowflake query result");
            let response = self
                .client
                .get(format!("{}{}", self.base_url, path))
                .header(AUTHORIZATION, self.auth.clone())
                .send()
                .await?;
            envelope = read_envelope(response).await?;
        }

        let data = require_data(envelope)?;
        debug!(query_id = ?data.query_id, rows = data.rowset.len(), "Snowflake query finished");

        into_result_set(data)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let url = format!("{}/session", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("delete", "true")])
            .header(AUTHORIZATION, self.auth.clone())
            .send()
            .await?;

        read_envelope::<Value>(response).await.map(|_| ())
    }
}

/// Read Snowflake's `{success, message, code, data}` envelope
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        return Err(WarehouseError::Api(format!("HTTP {}", status)));
    }

    let envelope: Envelope<T> = response.json().await?;
    check_envelope(envelope)
}

fn check_envelope<T>(envelope: Envelope<T>) -> Result<Envelope<T>> {
    if envelope.success {
        return Ok(envelope);
    }

    let message = envelope.message.unwrap_or_else(|| "unknown error".to_string());
    Err(match envelope.code {
        Some(code) => WarehouseError::Api(format!("{} (code {})", message, code)),
        None => WarehouseError::Api(message),
    })
}

fn require_data<T>(envelope: Envelope<T>) -> Result<T> {
    envelope
        .data
        .ok_or_else(|| WarehouseError::Protocol("response has no data".to_string()))
}

/// Result location of a statement that is still executing
fn pending_result_url(envelope: &Envelope<QueryData>) -> Result<Option<String>> {
    let code = envelope.code.as_deref();
    if code != Some(QUERY_IN_PROGRESS) && code != Some(QUERY_IN_PROGRESS_ASYNC) {
        return Ok(None);
    }

    envelope
        .data
        .as_ref()
        .and_then(|data| data.get_result_url.clone())
        .map(Some)
        .ok_or_else(|| WarehouseError::Protocol("query in progress without a result URL".to_string()))
}

/// `xy12345.eu-west-1` logs in as account `xy12345`
fn account_locator(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn into_result_set(data: QueryData) -> Result<ResultSet> {
    if !data.chunks.is_empty() {
        return Err(WarehouseError::Protocol(format!(
            "result split into {} chunks; only inline results are supported",
            data.chunks.len()
        )));
    }

    let rowtype = data
        .rowtype
        .ok_or_else(|| WarehouseError::Protocol("response has no row type".to_string()))?;

    let columns: Vec<Column> = rowtype
        .iter()
        .map(|rt| Column::new(rt.name.clone(), column_kind(rt)))
        .collect();

    let mut result = ResultSet::new(columns);
    for raw_row in data.rowset {
        if raw_row.len() != result.columns.len() {
            return Err(WarehouseError::Protocol(format!(
                "row has {} values for {} columns",
                raw_row.len(),
                result.columns.len()
            )));
        }

        let row = result
            .columns
            .iter()
            .zip(raw_row)
            .map(|(column, value)| decode_value(column.kind, value))
            .collect::<Result<Vec<_>>>()?;
        result.push_row(row);
    }

    Ok(result)
}

fn column_kind(rt: &RowType) -> ColumnKind {
    match rt.kind.as_str() {
        "fixed" if rt.scale.unwrap_or(0) == 0 => ColumnKind::Integer,
        "fixed" | "real" => ColumnKind::Float,
        "boolean" => ColumnKind::Boolean,
        "text" | "variant" | "object" | "array" | "binary" => ColumnKind::Text,
        "date" => ColumnKind::Date,
        "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz" => ColumnKind::Timestamp,
        "time" => ColumnKind::Time,
        _ => ColumnKind::Unknown,
    }
}

fn decode_value(kind: ColumnKind, value: Value) -> Result<Cell> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::String(raw) => decode_cell(kind, &raw),
        Value::Bool(b) => Ok(Cell::Bool(b)),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Cell::Int)
            .or_else(|| n.as_f64().map(Cell::Float))
            .unwrap_or(Cell::Null)),
        other => Ok(Cell::Text(other.to_string())),
    }
}

/// Decode one JSON-format rowset value according to its column type
fn decode_cell(kind: ColumnKind, raw: &str) -> Result<Cell> {
    let bad = || WarehouseError::Protocol(format!("cannot decode {:?} value {:?}", kind, raw));

    let cell = match kind {
        ColumnKind::Integer => match raw.parse::<i64>() {
            Ok(i) => Cell::Int(i),
            // NUMBER(38,0) can exceed i64
            Err(_) => Cell::Float(raw.parse::<f64>().map_err(|_| bad())?),
        },
        ColumnKind::Float => Cell::Float(raw.parse::<f64>().map_err(|_| bad())?),
        ColumnKind::Boolean => match raw {
            "1" | "true" | "TRUE" => Cell::Bool(true),
            "0" | "false" | "FALSE" => Cell::Bool(false),
            _ => return Err(bad()),
        },
        ColumnKind::Date => {
            let days: i64 = raw.parse().map_err(|_| bad())?;
            Cell::Date(date_from_epoch_days(days).ok_or_else(bad)?)
        }
        ColumnKind::Timestamp => Cell::Timestamp(parse_timestamp(raw).ok_or_else(bad)?),
        ColumnKind::Time => {
            let (secs, nanos) = parse_epoch(raw).ok_or_else(bad)?;
            let secs = u32::try_from(secs).map_err(|_| bad())?;
            Cell::Time(NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(bad)?)
        }
        ColumnKind::Text | ColumnKind::Unknown => Cell::Text(raw.to_string()),
    };

    Ok(cell)
}

fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(TimeDelta::try_days(days)?)
}

/// `"<secs>.<frac>"`, optionally followed by a biased timezone offset
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let mut parts = raw.split_whitespace();
    let (secs, nanos) = parse_epoch(parts.next()?)?;
    let utc = DateTime::from_timestamp(secs, nanos)?.naive_utc();

    match parts.next() {
        Some(offset) => {
            let minutes = offset.parse::<i64>().ok()? - TZ_OFFSET_BIAS;
            utc.checked_add_signed(TimeDelta::try_minutes(minutes)?)
        }
        None => Some(utc),
    }
}

/// Split a decimal seconds value into whole seconds and nanoseconds
fn parse_epoch(raw: &str) -> Option<(i64, u32)> {
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let mut secs: i64 = whole.parse().ok()?;

    let mut digits: String = frac.chars().take(9).collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    while digits.len() < 9 {
        digits.push('0');
    }
    let mut nanos: u32 = digits.parse().ok()?;

    if raw.starts_with('-') && nanos > 0 {
        secs -= 1;
        nanos = NANOS_PER_SEC - nanos;
    }

    Some((secs, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rowtype(name: &str, kind: &str, scale: Option<i64>) -> RowType {
        RowType {
            name: name.to_string(),
            kind: kind.to_string(),
            scale,
        }
    }

    #[test]
    fn maps_snowflake_types_to_column_kinds() {
        assert_eq!(column_kind(&rowtype("TOTAL", "fixed", Some(0))), ColumnKind::Integer);
        assert_eq!(column_kind(&rowtype("AVG_RISK", "fixed", Some(1))), ColumnKind::Float);
        assert_eq!(column_kind(&rowtype("SCORE", "real", None)), ColumnKind::Float);
        assert_eq!(column_kind(&rowtype("SEVERITY", "text", None)), ColumnKind::Text);
        assert_eq!(column_kind(&rowtype("PURCHASE_DATE", "date", None)), ColumnKind::Date);
        assert_eq!(
            column_kind(&rowtype("DETECTED_DATE", "timestamp_ntz", Some(9))),
            ColumnKind::Timestamp
        );
        assert_eq!(column_kind(&rowtype("X", "geography", None)), ColumnKind::Unknown);
    }

    #[test]
    fn decodes_numbers_including_non_finite() {
        assert_eq!(decode_cell(ColumnKind::Integer, "42").unwrap(), Cell::Int(42));
        assert_eq!(decode_cell(ColumnKind::Float, "6.5").unwrap(), Cell::Float(6.5));
        assert!(matches!(decode_cell(ColumnKind::Float, "NaN").unwrap(), Cell::Float(f) if f.is_nan()));
        assert_eq!(
            decode_cell(ColumnKind::Float, "inf").unwrap(),
            Cell::Float(f64::INFINITY)
        );
        assert_eq!(
            decode_cell(ColumnKind::Float, "-inf").unwrap(),
            Cell::Float(f64::NEG_INFINITY)
        );
        assert!(decode_cell(ColumnKind::Integer, "forty").is_err());
    }

    #[test]
    fn decodes_dates_and_timestamps() {
        assert_eq!(
            decode_cell(ColumnKind::Date, "19797").unwrap(),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );

        let expected = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_milli_opt(0, 0, 0, 250)
            .unwrap();
        assert_eq!(
            decode_cell(ColumnKind::Timestamp, "1609459200.250000000").unwrap(),
            Cell::Timestamp(expected)
        );

        // +02:00 offset, biased by 1440 minutes
        let local = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap();
        assert_eq!(
            decode_cell(ColumnKind::Timestamp, "1609459200.000000000 1560").unwrap(),
            Cell::Timestamp(local)
        );

        assert_eq!(
            decode_cell(ColumnKind::Time, "30600.5").unwrap(),
            Cell::Time(NaiveTime::from_hms_milli_opt(8, 30, 0, 500).unwrap())
        );
    }

    #[test]
    fn negative_epoch_fractions_borrow_a_second() {
        assert_eq!(parse_epoch("-1.250000000"), Some((-2, 750_000_000)));
        assert_eq!(parse_epoch("-86400"), Some((-86400, 0)));
        assert_eq!(parse_epoch("12.x"), None);
    }

    #[test]
    fn builds_result_set_from_rowset() {
        let data: QueryData = serde_json::from_value(json!({
            "rowtype": [
                {"name": "SEVERITY", "type": "text", "scale": null},
                {"name": "TOTAL", "type": "fixed", "scale": 0}
            ],
            "rowset": [["High", "12"], [null, "3"]],
            "queryId": "01b2-0000"
        }))
        .unwrap();

        let result = into_result_set(data).unwrap();
        assert_eq!(result.columns[0], Column::new("SEVERITY", ColumnKind::Text));
        assert_eq!(
            result.rows,
            vec![
                vec![Cell::Text("High".into()), Cell::Int(12)],
                vec![Cell::Null, Cell::Int(3)],
            ]
        );
    }

    #[test]
    fn rejects_chunked_results() {
        let data: QueryData = serde_json::from_value(json!({
            "rowtype": [{"name": "ID", "type": "text"}],
            "rowset": [],
            "chunks": [{"url": "https://example.invalid/chunk0"}]
        }))
        .unwrap();

        assert!(matches!(into_result_set(data), Err(WarehouseError::Protocol(_))));
    }

    #[test]
    fn failed_envelope_becomes_api_error() {
        let envelope: Envelope<LoginData> = serde_json::from_value(json!({
            "success": false,
            "message": "Incorrect username or password was specified.",
            "code": "390100",
            "data": null
        }))
        .unwrap();

        match check_envelope(envelope) {
            Err(WarehouseError::Api(msg)) => assert!(msg.contains("390100")),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn logout_envelope_without_data_is_accepted() {
        let envelope: Envelope<Value> = serde_json::from_value(json!({
            "success": true,
            "message": null,
            "code": null,
            "data": null
        }))
        .unwrap();

        let envelope = check_envelope(envelope).unwrap();
        assert!(matches!(require_data(envelope), Err(WarehouseError::Protocol(_))));
    }

    #[test]
    fn in_progress_reply_is_never_an_empty_result() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": true,
            "code": "333334",
            "message": "Asynchronous execution in progress.",
            "data": {"getResultUrl": "/queries/01b2/result", "queryId": "01b2"}
        }))
        .unwrap();

        assert_eq!(
            pending_result_url(&envelope).unwrap().as_deref(),
            Some("/queries/01b2/result")
        );

        let data = require_data(check_envelope(envelope).unwrap()).unwrap();
        assert!(matches!(into_result_set(data), Err(WarehouseError::Protocol(_))));
    }

    #[test]
    fn in_progress_reply_without_result_url_is_rejected() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": true,
            "code": "333333",
            "data": {"queryId": "01b2"}
        }))
        .unwrap();

        assert!(matches!(
            pending_result_url(&envelope),
            Err(WarehouseError::Protocol(_))
        ));
    }

    #[test]
    fn finished_reply_has_no_pending_result() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "success": true,
            "code": null,
            "data": {"rowtype": [], "rowset": [], "queryId": "01b2"}
        }))
        .unwrap();

        assert_eq!(pending_result_url(&envelope).unwrap(), None);
    }

    #[test]
    fn account_locator_drops_region() {
        assert_eq!(account_locator("xy12345.eu-west-1"), "xy12345");
        assert_eq!(account_locator("myorg-myaccount"), "myorg-myaccount");
    }

    #[tokio::test]
    async fn connect_without_credentials_is_a_config_error() {
        let connector = SnowflakeConnector::new(SnowflakeSettings::default()).unwrap();

        match connector.connect().await {
            Err(WarehouseError::MissingCredentials(missing)) => {
                assert_eq!(missing, vec!["SF_USER", "SF_PASSWORD", "SF_ACCOUNT"]);
            }
            Err(other) => panic!("expected missing credentials, got {}", other),
            Ok(_) => panic!("connect should fail"),
        }
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let settings = SnowflakeSettings {
            user: Some("analyst".into()),
            password: Some("secret".into()),
            account: Some("acct".into()),
            host: Some("http://127.0.0.1:9".into()),
            ..Default::default()
        };
        let connector = SnowflakeConnector::new(settings).unwrap();

        assert!(matches!(connector.connect().await, Err(WarehouseError::Http(_))));
    }

    mod mock {
        use axum::extract::{Query, State};
        use axum::http::{header, HeaderMap};
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{json, Value};
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        pub const TOKEN: &str = "session-token-1";

        /// What a fake Snowflake account saw
        #[derive(Default)]
        pub struct Seen {
            pub login_params: HashMap<String, String>,
            pub login_body: Value,
            pub statements: Vec<String>,
            pub authorizations: Vec<String>,
            pub polls: usize,
            pub logouts: usize,
        }

        #[derive(Clone)]
        struct Account {
            seen: Arc<Mutex<Seen>>,
            answer_async: bool,
        }

        fn authorization(headers: &HeaderMap) -> String {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        }

        fn rows() -> Value {
            json!({
                "success": true,
                "code": null,
                "message": null,
                "data": {
                    "rowtype": [
                        {"name": "SEVERITY", "type": "text", "scale": null},
                        {"name": "TOTAL", "type": "fixed", "scale": 0}
                    ],
                    "rowset": [["High", "5"], ["Medium", "4"]],
                    "queryId": "01b2"
                }
            })
        }

        async fn login(
            State(account): State<Account>,
            Query(params): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let mut seen = account.seen.lock().unwrap();
            seen.login_params = params;
            seen.login_body = body;
            Json(json!({"success": true, "data": {"token": TOKEN}}))
        }

        async fn query(
            State(account): State<Account>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let mut seen = account.seen.lock().unwrap();
            seen.authorizations.push(authorization(&headers));
            seen.statements.push(body["sqlText"].as_str().unwrap_or_default().to_string());

            if account.answer_async {
                Json(json!({
                    "success": true,
                    "code": "333334",
                    "message": "Asynchronous execution in progress.",
                    "data": {"getResultUrl": "/queries/01b2/result", "queryId": "01b2"}
                }))
            } else {
                Json(rows())
            }
        }

        async fn result(State(account): State<Account>, headers: HeaderMap) -> Json<Value> {
            let mut seen = account.seen.lock().unwrap();
            seen.authorizations.push(authorization(&headers));
            seen.polls += 1;
            Json(rows())
        }

        async fn logout(
            State(account): State<Account>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            if params.get("delete").map(String::as_str) == Some("true") {
                account.seen.lock().unwrap().logouts += 1;
            }
            Json(json!({"success": true, "code": null, "message": null, "data": null}))
        }

        /// Serve a fake account on a free local port, returning its base URL
        pub async fn spawn(answer_async: bool) -> (String, Arc<Mutex<Seen>>) {
            let seen = Arc::new(Mutex::new(Seen::default()));
            let account = Account {
                seen: seen.clone(),
                answer_async,
            };

            let app = Router::new()
                .route("/session/v1/login-request", post(login))
                .route("/queries/v1/query-request", post(query))
                .route("/queries/{id}/result", get(result))
                .route("/session", post(logout))
                .with_state(account);

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            (format!("http://{}", addr), seen)
        }
    }

    fn settings_for(host: &str) -> SnowflakeSettings {
        let vars = [
            ("SF_USER", "analyst"),
            ("SF_PASSWORD", "hunter2"),
            ("SF_ACCOUNT", "xy12345.eu-west-1"),
            ("SF_WAREHOUSE", "COMPUTE_WH"),
            ("SF_DATABASE", "ASSETS"),
            ("SF_SCHEMA", "PUBLIC"),
            ("SF_HOST", host),
        ];
        SnowflakeSettings::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[tokio::test]
    async fn session_logs_in_queries_and_logs_out() {
        let (host, seen) = mock::spawn(false).await;
        let connector = SnowflakeConnector::new(settings_for(&host)).unwrap();

        let mut conn = connector.connect().await.unwrap();
        let result = conn.query("SELECT 1").await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(
            result.rows,
            vec![
                vec![Cell::Text("High".into()), Cell::Int(5)],
                vec![Cell::Text("Medium".into()), Cell::Int(4)],
            ]
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.login_params["warehouse"], "COMPUTE_WH");
        assert_eq!(seen.login_params["databaseName"], "ASSETS");
        assert_eq!(seen.login_params["schemaName"], "PUBLIC");
        assert!(seen.login_params.contains_key("request_id"));

        let login = &seen.login_body["data"];
        assert_eq!(login["ACCOUNT_NAME"], "xy12345");
        assert_eq!(login["LOGIN_NAME"], "analyst");
        assert_eq!(login["PASSWORD"], "hunter2");
        assert_eq!(login["SESSION_PARAMETERS"]["JDBC_QUERY_RESULT_FORMAT"], "JSON");

        assert_eq!(seen.statements, vec!["SELECT 1"]);
        assert_eq!(
            seen.authorizations,
            vec![format!("Snowflake Token=\"{}\"", mock::TOKEN)]
        );
        assert_eq!(seen.polls, 0);
        assert_eq!(seen.logouts, 1);
    }

    #[tokio::test]
    async fn running_query_is_polled_until_ready() {
        let (host, seen) = mock::spawn(true).await;
        let connector = SnowflakeConnector::new(settings_for(&host)).unwrap();

        let mut conn = connector.connect().await.unwrap();
        let result = conn.query("SELECT 1").await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.columns[1], Column::new("TOTAL", ColumnKind::Integer));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.polls, 1);
        assert_eq!(seen.authorizations.len(), 2);
        assert!(seen.authorizations.iter().all(|a| a.contains(mock::TOKEN)));
    }
}
