//! ClickHouse HTTP response decoding.
//!
//! Queries are sent with `default_format=JSON`, so a successful response body
//! is a single JSON document:
//!
//! ```text
//! {"meta":[{"name":"c","type":"UInt64"}],"data":[{"c":42}],"rows":1,
//!  "statistics":{"elapsed":0.001,"rows_read":1,"bytes_read":8}}
//! ```
//!
//! Failed queries come back with a non-2xx status and a plain-text exception
//! (`Code: 62. DB::Exception: Syntax error: ...`), classified here into
//! connection and database errors.

use crate::error::{AppError, AppResult};
use crate::models::{ColumnMetadata, QueryResult};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Exception codes that mean the server refused our credentials.
const AUTH_EXCEPTION_CODES: &[&str] = &[
    "192", // UNKNOWN_USER
    "193", // WRONG_PASSWORD
    "194", // REQUIRED_PASSWORD
    "516", // AUTHENTICATION_FAILED
];

#[derive(Debug, Deserialize)]
struct MetaColumn {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub rows_read: u64,
    #[serde(default)]
    pub bytes_read: u64,
}

#[derive(Debug, Deserialize)]
struct JsonFormatResponse {
    meta: Vec<MetaColumn>,
    data: Vec<serde_json::Map<String, JsonValue>>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

/// Decode a `FORMAT JSON` body into a [`QueryResult`].
///
/// An empty body is what ClickHouse returns for statements without a result
/// set (DDL, INSERT); it decodes to an empty result. A server exception
/// appended to a partially streamed body is a database error.
pub fn decode_json_body(body: &str, execution_time_ms: u64) -> AppResult<QueryResult> {
    if body.trim().is_empty() {
        return Ok(QueryResult::empty(execution_time_ms));
    }

    let response: JsonFormatResponse = serde_json::from_str(body).map_err(|e| {
        match trailing_exception(body) {
            Some(exception) => classify_exception(200, None, exception),
            None => AppError::internal(format!(
                "Unexpected ClickHouse response (expected FORMAT JSON): {}",
                e
            )),
        }
    })?;

    let columns = response
        .meta
        .into_iter()
        .map(|m| ColumnMetadata::from_clickhouse(m.name, m.type_name))
        .collect();

    // Prefer the server-side timing when present; it excludes network time.
    let execution_time_ms = response
        .statistics
        .map(|s| (s.elapsed * 1000.0).round() as u64)
        .unwrap_or(execution_time_ms);

    Ok(QueryResult {
        columns,
        rows: response.data,
        execution_time_ms,
    })
}

/// Extract the numeric code from `Code: 62. DB::Exception: ...`.
pub fn exception_code(body: &str) -> Option<String> {
    let rest = body.trim_start().strip_prefix("Code:")?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// The exception text ClickHouse writes after a result it already started
/// sending: the last line that starts with `Code: N.`.
fn trailing_exception(body: &str) -> Option<&str> {
    body.lines()
        .rev()
        .map(str::trim_start)
        .find(|line| exception_code(line).is_some())
}

/// Map a failed ClickHouse HTTP response to an error.
///
/// `header_code` is the `X-ClickHouse-Exception-Code` response header; the
/// code embedded in the body is used when the header is absent.
pub fn classify_exception(status: u16, header_code: Option<String>, body: &str) -> AppError {
    let code = header_code.or_else(|| exception_code(body));
    let message = first_line(body);

    let auth_failure = matches!(status, 401 | 403)
        || code
            .as_deref()
            .is_some_and(|c| AUTH_EXCEPTION_CODES.contains(&c));

    if auth_failure {
        return AppError::connection(
            format!("Authentication rejected (HTTP {}): {}", status, message),
            "Check connections.clickhouse.username and password",
        );
    }

    AppError::database(
        message,
        code,
        "Check the generated SQL and the tables it references",
    )
}

fn first_line(body: &str) -> String {
    let line = body.trim().lines().next().unwrap_or("").trim();
    if line.is_empty() {
        "empty error response".to_string()
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_body() {
        let body = r#"{
            "meta": [{"name": "EVENT_TYPE", "type": "String"}, {"name": "clicks", "type": "UInt64"}],
            "data": [{"EVENT_TYPE": "click", "clicks": 1234}],
            "rows": 1,
            "statistics": {"elapsed": 0.0125, "rows_read": 10, "bytes_read": 80}
        }"#;
        let result = decode_json_body(body, 99).unwrap();
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[1].type_name, "UInt64");
        assert_eq!(result.rows[0]["clicks"], json!(1234));
        assert_eq!(result.execution_time_ms, 13);
    }

    #[test]
    fn test_decode_without_statistics_keeps_client_timing() {
        let body = r#"{"meta": [], "data": [], "rows": 0}"#;
        let result = decode_json_body(body, 42).unwrap();
        assert_eq!(result.execution_time_ms, 42);
        assert!(result.is_empty());
    }

    #[test]
    fn test_decode_empty_body() {
        let result = decode_json_body("\n", 5).unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_decode_non_json_body() {
        let err = decode_json_body("1\t2\n", 5).unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[test]
    fn test_decode_exception_after_partial_body() {
        let body = "{\n\t\"meta\": [{\"name\": \"c\", \"type\": \"UInt64\"}],\n\t\"data\": [\n\t\t{\"c\": 1},\n\
                    Code: 241. DB::Exception: Memory limit (total) exceeded. (MEMORY_LIMIT_EXCEEDED)\n";
        match decode_json_body(body, 5).unwrap_err() {
            AppError::Database { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("241"));
                assert!(message.contains("Memory limit"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn test_exception_code() {
        assert_eq!(
            exception_code("Code: 62. DB::Exception: Syntax error: failed at position 1"),
            Some("62".to_string())
        );
        assert_eq!(exception_code("something else"), None);
        assert_eq!(exception_code("Code: x"), None);
    }

    #[test]
    fn test_classify_syntax_error() {
        let err = classify_exception(
            400,
            None,
            "Code: 62. DB::Exception: Syntax error: failed at position 8 (SELEC)\n(version 23.8)",
        );
        match err {
            AppError::Database { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("62"));
                assert!(message.starts_with("Code: 62."));
                assert!(!message.contains('\n'));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_auth_failure_by_code() {
        let err = classify_exception(
            500,
            Some("516".to_string()),
            "Code: 516. DB::Exception: default: Authentication failed",
        );
        assert!(matches!(err, AppError::Connection { .. }));
    }

    #[test]
    fn test_classify_auth_failure_by_status() {
        let err = classify_exception(403, None, "");
        assert!(matches!(err, AppError::Connection { .. }));
    }

    #[test]
    fn test_header_code_wins_over_body() {
        let err = classify_exception(404, Some("60".to_string()), "Code: 1. whatever");
        match err {
            AppError::Database { code, .. } => assert_eq!(code.as_deref(), Some("60")),
            other => panic!("expected database error, got {:?}", other),
        }
    }
}
