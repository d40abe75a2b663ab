//! Error types for ZohoDB

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ZohoDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Prompt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Prompt(err.to_string())
    }
}

/// Remote API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered `status=failure`, or left out a field the operation needs.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String, code: Option<i64> },

    #[error("Invalid JSON response: {0}")]
    InvalidJsonResponse(String),

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("Request deadline exceeded")]
    Timeout,

    #[error("Access token rejected by the service after a refresh")]
    TokenRejected,

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),
}

impl ApiError {
    /// Build an `UnexpectedResponse` without an error code
    pub fn unexpected(message: impl Into<String>) -> Self {
        ApiError::UnexpectedResponse {
            message: message.into(),
            code: None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::HttpRequest("Failed to connect to the Zoho API".to_string())
        } else {
            ApiError::HttpRequest(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Zoho client id and client secret must both be configured")]
    MissingCredentials,

    #[error("Unable to find any workbooks with the configured name(s): {0}")]
    NoMatchingWorkbooks(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Local cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache table '{0}' does not exist or has an invalid name")]
    InvalidCacheTable(String),

    #[error("Cache table '{table}' is corrupted: {reason}")]
    CorruptedCacheTable { table: String, reason: String },

    #[error(
        "Timed out waiting for the lock on cache table '{table}'; if no process holds it, remove {}",
        .marker.display()
    )]
    LockTimeout { table: String, marker: PathBuf },

    #[error("Failed to serialize cache value: {0}")]
    Serialize(String),

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Could not determine a cache directory")]
    NoHome,
}
