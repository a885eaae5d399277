//! Connection failures that need no server at all.

use clickhouse_text2sql::config::ClickHouseConfig;
use clickhouse_text2sql::db::ClickHouseConnector;
use clickhouse_text2sql::error::AppError;
use std::time::Duration;

/// A loopback port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let config = ClickHouseConfig::new("127.0.0.1", "default", "", closed_port());

    let err = ClickHouseConnector::new(config)
        .with_connect_timeout(Duration::from_secs(2))
        .create_connection()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Connection { .. }), "got {:?}", err);
    assert!(err.suggestion().is_some());
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_invalid_host_is_rejected_before_connecting() {
    let config = ClickHouseConfig::new("bad host name", "default", "", 8123);

    let err = ClickHouseConnector::new(config)
        .create_connection()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput { .. }), "got {:?}", err);
}
