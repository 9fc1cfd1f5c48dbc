use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{build_schema_description, LookbackAge, QueryError, SchemaRow};

pub const DEFAULT_BASE_URL: &str = "https://logfire-api.pydantic.dev";

/// Read-only query access to a tracing backend
#[async_trait]
pub trait TraceBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run `sql` over records no older than `age`
    async fn query(&self, sql: &str, age: LookbackAge) -> Result<Vec<Value>, QueryError>;

    /// Human-readable description of the queryable columns
    async fn schema(&self) -> Result<String, QueryError>;

    /// Fetch every record of one trace, ordered by start time
    async fn fetch_trace(
        &self,
        trace_id: &str,
        age: LookbackAge,
    ) -> Result<Vec<Value>, QueryError> {
        let sql = trace_query(trace_id)?;
        self.query(&sql, age).await
    }
}

/// SQL selecting all records of `trace_id`.
///
/// Trace ids are 32 hexadecimal characters; anything else is rejected so the
/// id can be embedded in the query text.
pub fn trace_query(trace_id: &str) -> Result<String, QueryError> {
    if trace_id.len() != 32 || !trace_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(QueryError::Validation(format!(
            "trace id '{}' is not 32 hexadecimal characters",
            trace_id
        )));
    }
    Ok(format!(
        "SELECT * FROM records WHERE trace_id = '{}' ORDER BY start_timestamp",
        trace_id.to_ascii_lowercase()
    ))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Option<Vec<Value>>,
}

/// HTTP client for the Logfire query API
#[derive(Debug)]
pub struct LogfireClient {
    read_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl LogfireClient {
    pub fn new(read_token: String, base_url: Option<String>) -> Self {
        Self {
            read_token,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from `LOGFIRE_READ_TOKEN`.
    ///
    /// `base_url` takes precedence over `LOGFIRE_BASE_URL`.
    pub fn from_env(base_url: Option<String>) -> Result<Self, QueryError> {
        let token = std::env::var("LOGFIRE_READ_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| QueryError::Config("LOGFIRE_READ_TOKEN is not set".into()))?;
        let base_url = base_url.or_else(|| {
            std::env::var("LOGFIRE_BASE_URL")
                .ok()
                .filter(|u| !u.is_empty())
        });
        Ok(Self::new(token, base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn query_json_rows(
        &self,
        sql: &str,
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, QueryError> {
        let url = format!("{}/v1/query", self.base_url);
        let mut params = vec![
            ("sql", sql.to_string()),
            ("json_rows", "true".to_string()),
        ];
        if let Some(ts) = min_timestamp {
            params.push(("min_timestamp", ts.to_rfc3339()));
        }

        debug!(sql_len = sql.len(), min_timestamp = ?min_timestamp, "Querying Logfire");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.read_token)
            .header("accept", "application/json")
            .query(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(QueryError::Api { status, body });
        }

        let body: QueryResponse = resp.json().await?;
        let rows = body
            .rows
            .ok_or_else(|| QueryError::Response("missing 'rows' field".into()))?;

        info!(rows = rows.len(), "Logfire query completed");
        Ok(rows)
    }
}

#[async_trait]
impl TraceBackend for LogfireClient {
    fn name(&self) -> &str {
        "Logfire"
    }

    async fn query(&self, sql: &str, age: LookbackAge) -> Result<Vec<Value>, QueryError> {
        let window = chrono::Duration::minutes(i64::from(age.minutes()));
        self.query_json_rows(sql, Some(Utc::now() - window)).await
    }

    async fn schema(&self) -> Result<String, QueryError> {
        let rows = self
            .query_json_rows("SHOW COLUMNS FROM records", None)
            .await?;
        let rows: Vec<SchemaRow> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| QueryError::Response(format!("malformed schema row: {}", e)))?;
        Ok(build_schema_description(&rows))
    }
}
