//! Connection provider.
//!
//! Turns [`ClickHouseConfig`] into a live [`ClickHouseClient`]. Creating the
//! connection performs a `SELECT version()` handshake so that an unreachable
//! host or rejected credentials fail here rather than at the first real query.

use crate::config::{ClickHouseConfig, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::db::client::ClickHouseClient;
use crate::error::{AppError, AppResult};
use std::time::Duration;
use tracing::info;
use url::Url;

pub struct ClickHouseConnector {
    config: ClickHouseConfig,
    connect_timeout: Duration,
}

impl ClickHouseConnector {
    pub fn new(config: ClickHouseConfig) -> Self {
        Self {
            config,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the TCP/TLS connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// HTTP interface URL derived from host, port and TLS setting.
    ///
    /// A host given with an explicit `http://` or `https://` prefix keeps
    /// that scheme.
    pub fn endpoint_url(&self) -> AppResult<Url> {
        let host = self.config.host.trim().trim_end_matches('/');
        let (scheme, host) = if let Some(rest) = host.strip_prefix("https://") {
            ("https", rest)
        } else if let Some(rest) = host.strip_prefix("http://") {
            ("http", rest)
        } else if self.config.use_tls() {
            ("https", host)
        } else {
            ("http", host)
        };

        let raw = format!("{}://{}:{}/", scheme, host, self.config.port);
        Url::parse(&raw)
            .map_err(|e| AppError::invalid_input(format!("Invalid ClickHouse host '{}': {}", host, e)))
    }

    /// Open the connection.
    pub async fn create_connection(&self) -> AppResult<ClickHouseClient> {
        let endpoint = self.endpoint_url()?;

        info!(
            endpoint = %endpoint,
            username = %self.config.username,
            "Connecting to ClickHouse"
        );

        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        let mut client = ClickHouseClient::new(
            http,
            endpoint,
            self.config.username.clone(),
            self.config.password.clone(),
            self.config.database.clone(),
        );

        let version = client.fetch_server_version().await?;
        info!(
            server_version = version.as_deref().unwrap_or("unknown"),
            "Connected to ClickHouse"
        );
        client.set_server_version(version);

        Ok(client)
    }
}
