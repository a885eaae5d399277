//! Configuration handling for clickhouse-text2sql.
//!
//! Two layers: CLI arguments and environment variables (via clap) select the
//! run mode, while the YAML configuration file carries the ClickHouse
//! credentials and the completion model settings.

use crate::error::{AppError, AppResult};
use crate::format::OutputFormat;
use crate::llm::CompletionParams;
use crate::schema::{DEFAULT_EXCLUDED_TABLE, DEFAULT_SCHEMA_CATALOG};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
pub const DEFAULT_QUESTION: &str = "How many LinkedIn clicks did we have in 2022?";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ClickHouse defaults
pub const DEFAULT_CLICKHOUSE_PORT: u16 = 8443;
pub const DEFAULT_CLICKHOUSE_USER: &str = "default";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Where the schema description embedded in the prompt comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemaMode {
    /// Fixed, hand-written EVENTS_DB schema text
    #[default]
    Static,
    /// Rendered from INFORMATION_SCHEMA.COLUMNS of the connected database
    Live,
}

impl std::fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Which built-in prompt template to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TemplateKind {
    /// Few-shot examples with the EVENTS_DB schema inlined; only the question is substituted
    #[default]
    FewShot,
    /// Few-shot examples; both the question and the schema description are substituted
    SchemaAware,
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FewShot => write!(f, "few-shot"),
            Self::SchemaAware => write!(f, "schema-aware"),
        }
    }
}

/// Command-line configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "text2sql",
    about = "Answer a natural-language question over ClickHouse by generating SQL with a completion model",
    version,
    author
)]
pub struct Config {
    /// Natural-language question to translate into SQL
    #[arg(
        short,
        long,
        default_value = DEFAULT_QUESTION,
        env = "TEXT2SQL_QUESTION"
    )]
    pub question: String,

    /// Path to the YAML configuration file
    #[arg(
        short,
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        env = "TEXT2SQL_CONFIG"
    )]
    pub config_path: PathBuf,

    /// Schema description source (static or live)
    #[arg(
        long,
        value_enum,
        default_value = "static",
        env = "TEXT2SQL_SCHEMA_MODE"
    )]
    pub schema_mode: SchemaMode,

    /// Database described in live schema mode
    #[arg(
        long,
        default_value = DEFAULT_SCHEMA_CATALOG,
        env = "TEXT2SQL_SCHEMA_CATALOG"
    )]
    pub schema_catalog: String,

    /// Tables left out of the live schema description.
    /// Can be specified multiple times or as comma-separated values.
    #[arg(
        long = "exclude-table",
        value_name = "TABLE",
        default_value = DEFAULT_EXCLUDED_TABLE,
        env = "TEXT2SQL_EXCLUDE_TABLES",
        value_delimiter = ','
    )]
    pub exclude_tables: Vec<String>,

    /// Prompt template (few-shot or schema-aware)
    #[arg(
        long,
        value_enum,
        default_value = "few-shot",
        env = "TEXT2SQL_TEMPLATE"
    )]
    pub template: TemplateKind,

    /// Output format for the result set (table, markdown or json)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "table",
        env = "TEXT2SQL_FORMAT"
    )]
    pub format: OutputFormat,

    /// Print the generated SQL to stdout before the result
    #[arg(long, env = "TEXT2SQL_SHOW_SQL")]
    pub show_sql: bool,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "TEXT2SQL_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TEXT2SQL_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "TEXT2SQL_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            question: DEFAULT_QUESTION.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            schema_mode: SchemaMode::Static,
            schema_catalog: DEFAULT_SCHEMA_CATALOG.to_string(),
            exclude_tables: vec![DEFAULT_EXCLUDED_TABLE.to_string()],
            template: TemplateKind::FewShot,
            format: OutputFormat::Table,
            show_sql: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Contents of the YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub connections: Connections,
    pub models: Models,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connections {
    pub clickhouse: ClickHouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Models {
    pub openai: OpenAiConfig,
}

/// ClickHouse connection parameters.
#[derive(Clone, Deserialize)]
pub struct ClickHouseConfig {
    pub host: String,
    #[serde(default = "default_clickhouse_user")]
    pub username: String,
    /// Sensitive - never logged.
    #[serde(default)]
    pub password: String,
    #[serde(
        default = "default_clickhouse_port",
        deserialize_with = "port_from_int_or_string"
    )]
    pub port: u16,
    /// Default database for unqualified table names. Server default when absent.
    #[serde(default)]
    pub database: Option<String>,
    /// Force https (true) or http (false). Derived from the port when absent.
    #[serde(default)]
    pub secure: Option<bool>,
}

impl ClickHouseConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            port,
            database: None,
            secure: None,
        }
    }

    /// Whether to talk https. Ports 443 and 8443 are the ClickHouse TLS ports.
    pub fn use_tls(&self) -> bool {
        self.secure.unwrap_or(matches!(self.port, 443 | 8443))
    }
}

impl std::fmt::Debug for ClickHouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("database", &self.database)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Completion model settings.
#[derive(Clone, Deserialize)]
pub struct OpenAiConfig {
    /// Sensitive - never logged.
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub params: CompletionParams,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, params: CompletionParams) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            params,
        }
    }

    /// Base URL of the completion API, without trailing slash.
    pub fn base_url_or_default(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
            .trim_end_matches('/')
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("params", &self.params)
            .finish()
    }
}

fn default_clickhouse_user() -> String {
    DEFAULT_CLICKHOUSE_USER.to_string()
}

fn default_clickhouse_port() -> u16 {
    DEFAULT_CLICKHOUSE_PORT
}

/// Accept `port: 8443` as well as `port: "8443"`.
fn port_from_int_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Int(u16),
        Str(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Int(p) => Ok(p),
        Port::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", s))),
    }
}

impl AppConfig {
    /// Load the configuration file.
    ///
    /// Read and parse failures are logged and returned; the caller must not
    /// continue without a configuration.
    pub fn load(path: &Path) -> AppResult<Self> {
        let path_str = path.display().to_string();
        debug!(path = %path_str, "Loading configuration");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            error!(path = %path_str, error = %e, "Cannot read configuration file");
            AppError::config(format!("cannot read file: {}", e), &path_str)
        })?;

        Self::from_yaml_str(&contents, &path_str).inspect_err(|e| {
            error!(path = %path_str, error = %e, "Invalid configuration file");
        })
    }

    /// Parse configuration from YAML text. `origin` names the source in errors.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> AppResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| AppError::config(e.to_string(), origin))?;
        config.validate(origin)?;
        Ok(config)
    }

    fn validate(&self, origin: &str) -> AppResult<()> {
        if self.connections.clickhouse.host.trim().is_empty() {
            return Err(AppError::config(
                "connections.clickhouse.host must not be empty",
                origin,
            ));
        }
        if self.connections.clickhouse.port == 0 {
            return Err(AppError::config(
                "connections.clickhouse.port must be greater than 0",
                origin,
            ));
        }
        if self.models.openai.api_key.trim().is_empty() {
            return Err(AppError::config(
                "models.openai.api_key must not be empty",
                origin,
            ));
        }
        self.models
            .openai
            .params
            .request_timeout_duration()
            .map_err(|message| AppError::config(message, origin))?;
        Ok(())
    }
}
