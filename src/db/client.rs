//! ClickHouse client handle.
//!
//! One [`ClickHouseClient`] is created per run and reused for every query.
//! It talks to the ClickHouse HTTP interface: the SQL text is the request
//! body, credentials travel in `X-ClickHouse-*` headers and results come back
//! as `FORMAT JSON`.

use crate::db::QueryBackend;
use crate::db::types::{classify_exception, decode_json_body};
use crate::error::{AppResult, from_transport_error};
use crate::models::QueryResult;
use std::time::Instant;
use tracing::debug;
use url::Url;
use uuid::Uuid;

const HEADER_USER: &str = "X-ClickHouse-User";
const HEADER_KEY: &str = "X-ClickHouse-Key";
const HEADER_DATABASE: &str = "X-ClickHouse-Database";
const HEADER_EXCEPTION_CODE: &str = "X-ClickHouse-Exception-Code";

/// Authenticated session against one ClickHouse server.
pub struct ClickHouseClient {
    http: reqwest::Client,
    endpoint: Url,
    username: String,
    /// Sensitive - never logged.
    password: String,
    database: Option<String>,
    server_version: Option<String>,
}

impl ClickHouseClient {
    pub(crate) fn new(
        http: reqwest::Client,
        endpoint: Url,
        username: String,
        password: String,
        database: Option<String>,
    ) -> Self {
        Self {
            http,
            endpoint,
            username,
            password,
            database,
            server_version: None,
        }
    }

    /// Base URL of the HTTP interface.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Server version reported during the connection handshake.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub(crate) fn set_server_version(&mut self, version: Option<String>) {
        self.server_version = version;
    }

    /// Execute one SQL statement and return its result set.
    pub async fn query(&self, sql: &str) -> AppResult<QueryResult> {
        let start = Instant::now();
        let query_id = Uuid::new_v4().to_string();

        debug!(
            sql = %sql,
            query_id = %query_id,
            "Executing query"
        );

        let url = self.query_url(&query_id);
        let mut request = self
            .http
            .post(url)
            .header(HEADER_USER, &self.username)
            .header(HEADER_KEY, &self.password)
            .body(sql.to_string());
        if let Some(database) = &self.database {
            request = request.header(HEADER_DATABASE, database);
        }

        let response = request.send().await.map_err(|e| from_transport_error(&e))?;
        let status = response.status();
        let header_code = response
            .headers()
            .get(HEADER_EXCEPTION_CODE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.map_err(|e| from_transport_error(&e))?;

        if !status.is_success() {
            debug!(
                query_id = %query_id,
                status = status.as_u16(),
                "Query failed"
            );
            return Err(classify_exception(status.as_u16(), header_code, &body));
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        let result = decode_json_body(&body, execution_time_ms)?;

        debug!(
            query_id = %query_id,
            rows = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "Query finished"
        );
        Ok(result)
    }

    /// Read the server version; the connection handshake.
    pub(crate) async fn fetch_server_version(&self) -> AppResult<Option<String>> {
        let result = self.query("SELECT version() AS version").await?;
        Ok(result
            .column_values("version")
            .next()
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    fn query_url(&self, query_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("default_format", "JSON")
            .append_pair("output_format_json_quote_64bit_integers", "0")
            .append_pair("wait_end_of_query", "1")
            .append_pair("query_id", query_id);
        url
    }
}

impl QueryBackend for ClickHouseClient {
    async fn query(&self, sql: &str) -> AppResult<QueryResult> {
        ClickHouseClient::query(self, sql).await
    }

    fn name(&self) -> &'static str {
        "clickhouse"
    }
}

impl std::fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("server_version", &self.server_version)
            .finish()
    }
}
