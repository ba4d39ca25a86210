//! CLI-specific error types
//!
//! CLI errors end the process with a non-zero exit. Problems with the
//! request itself are answered on stdout as an error envelope instead.

use std::io;

use thiserror::Error;

use crate::errors::QueryError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration or catalog file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Request envelope is not `{collection, filter, pagination?}`
    InvalidRequest,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::InvalidRequest => "AERO_CLI_INVALID_REQUEST",
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("AERO_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    #[error("AERO_CLI_IO_ERROR: {0}")]
    Io(String),

    #[error("AERO_CLI_INVALID_REQUEST: {0}")]
    InvalidRequest(String),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        CliError::Io(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        CliError::InvalidRequest(msg.into())
    }

    pub fn code(&self) -> CliErrorCode {
        match self {
            CliError::Config(_) => CliErrorCode::ConfigError,
            CliError::Io(_) => CliErrorCode::IoError,
            CliError::InvalidRequest(_) => CliErrorCode::InvalidRequest,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().code()
    }

    /// Message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            CliError::Config(msg) | CliError::Io(msg) | CliError::InvalidRequest(msg) => msg,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// Config and catalog failures surface while loading, before any request
impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        Self::config_error(format!("{}: {}", e.code().code(), e))
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_becomes_config_error() {
        let err: CliError = QueryError::ConfigInvalid("max_depth must be at least 1".into()).into();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
        assert!(err.message().starts_with("AERO_CONFIG_INVALID"));
    }

    #[test]
    fn test_display_carries_code() {
        let err = CliError::invalid_request("missing collection");
        assert_eq!(err.to_string(), "AERO_CLI_INVALID_REQUEST: missing collection");
        assert_eq!(err.message(), "missing collection");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: CliError = io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed").into();
        assert_eq!(err.code_str(), "AERO_CLI_IO_ERROR");
    }
}
