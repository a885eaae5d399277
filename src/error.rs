//! Error types for clickhouse-text2sql.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant that can be caused by the environment carries a suggestion that the
//! CLI prints next to the error message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {message} (file: {path})")]
    Config { message: String, path: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// ClickHouse exception code, e.g. "62" for a syntax error
        code: Option<String>,
        suggestion: String,
    },

    #[error("Completion failed: {message}")]
    Completion { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error for the given file.
    pub fn config(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional ClickHouse exception code.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create a completion error with a helpful suggestion.
    pub fn completion(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => {
                Some("Check the YAML syntax and the connections/models sections")
            }
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Completion { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidInput { .. } => 2,
            Self::Connection { .. } => 3,
            Self::Completion { .. } => 4,
            Self::Database { .. } => 5,
            Self::Internal { .. } => 1,
        }
    }
}

/// Convert ClickHouse HTTP transport failures to AppError.
///
/// Only used for the database client; the completion client maps its own
/// transport errors to [`AppError::Completion`].
pub(crate) fn from_transport_error(err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::connection(
            format!("Timed out talking to ClickHouse: {}", err),
            "Check that the host is reachable or raise --connect-timeout",
        )
    } else if err.is_connect() {
        AppError::connection(
            format!("Cannot reach ClickHouse: {}", err),
            "Check host, port and network connectivity to the ClickHouse server",
        )
    } else if err.is_builder() {
        AppError::invalid_input(format!("Invalid ClickHouse request: {}", err))
    } else if err.is_decode() || err.is_body() {
        AppError::internal(format!("Failed to read ClickHouse response: {}", err))
    } else {
        AppError::connection(
            format!("HTTP error: {}", err),
            "Check network connectivity and ClickHouse server status",
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::internal(format!("JSON error: {}", err))
    }
}

/// Result type alias for fallible operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = AppError::database("Syntax error", Some("62".to_string()), "Check SQL syntax");
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
    }

    #[test]
    fn test_config_error_mentions_path() {
        let err = AppError::config("missing key", "config/config.yaml");
        assert!(err.to_string().contains("config/config.yaml"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_invalid_input_has_no_suggestion() {
        assert!(AppError::invalid_input("bad").suggestion().is_none());
        assert!(AppError::internal("oops").suggestion().is_none());
    }

    #[test]
    fn test_exit_codes_distinguish_stages() {
        assert_eq!(AppError::config("x", "y").exit_code(), 2);
        assert_eq!(AppError::connection("x", "y").exit_code(), 3);
        assert_eq!(AppError::completion("x", "y").exit_code(), 4);
        assert_eq!(AppError::database("x", None, "y").exit_code(), 5);
    }

    #[test]
    fn test_json_error_converts_to_internal() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AppError = json_err.into();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
