//! Error types for the HTTP sensor bridge
//!
//! Errors are grouped by how far they are allowed to travel: configuration
//! errors abort construction, fetch errors reach the caller of
//! `get_value`, and query errors stay inside the fetcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for sensor bridge operations
pub type Result<T> = std::result::Result<T, SensorError>;

/// Error types for sensor bridge operations
#[derive(Error, Debug)]
pub enum SensorError {
    /// Configuration errors (fatal at construction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection level failures while talking to the endpoint
    #[error("Network error ({url}): {message}")]
    Network { url: String, message: String },

    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    /// Endpoint answered with a non-2xx status
    #[error("HTTP error {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Endpoint answered 2xx but the body is not JSON
    #[error("Invalid response body from {url}: {message}")]
    InvalidBody { url: String, message: String },

    /// Query expression could not be parsed or evaluated
    #[error("Query error in '{expression}': {message}")]
    Query { expression: String, message: String },

    /// The requested field has no query configured
    #[error("Field not configured: {0}")]
    FieldNotConfigured(String),

    /// The field is configured but produced no value in the last fetch
    #[error("Field unavailable: {0}")]
    FieldUnavailable(String),

    /// Unknown field name requested by a host
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    ConnectionFailed,
    ConnectionTimeout,
    UpstreamStatus,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,

    // Data errors (1400-1499)
    ParsingFailed,
    QueryFailed,

    // Field errors (1500-1599)
    FieldNotConfigured,
    FieldUnavailable,
    UnknownField,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::ConnectionFailed => 1001,
            ErrorCode::ConnectionTimeout => 1002,
            ErrorCode::UpstreamStatus => 1003,

            ErrorCode::ConfigurationInvalid => 1201,

            ErrorCode::ParsingFailed => 1401,
            ErrorCode::QueryFailed => 1402,

            ErrorCode::FieldNotConfigured => 1501,
            ErrorCode::FieldUnavailable => 1502,
            ErrorCode::UnknownField => 1503,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "connection",
            1200..=1299 => "configuration",
            1400..=1499 => "data",
            1500..=1599 => "field",
            _ => "unknown",
        }
    }
}

impl SensorError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error for the given URL
    pub fn network<U: Into<String>, S: Into<String>>(url: U, msg: S) -> Self {
        Self::Network {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error for the given URL
    pub fn timeout<U: Into<String>, S: Into<String>>(url: U, msg: S) -> Self {
        Self::Timeout {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a non-2xx status error
    pub fn http_status<U: Into<String>>(url: U, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Create an invalid body error
    pub fn invalid_body<U: Into<String>, S: Into<String>>(url: U, msg: S) -> Self {
        Self::InvalidBody {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a query error
    pub fn query<E: Into<String>, S: Into<String>>(expression: E, msg: S) -> Self {
        Self::Query {
            expression: expression.into(),
            message: msg.into(),
        }
    }

    /// Create a field-not-configured error
    pub fn field_not_configured<S: Into<String>>(field: S) -> Self {
        Self::FieldNotConfigured(field.into())
    }

    /// Create a field-unavailable error
    pub fn field_unavailable<S: Into<String>>(field: S) -> Self {
        Self::FieldUnavailable(field.into())
    }

    /// Map the error to its structured code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            SensorError::Config(_) => ErrorCode::ConfigurationInvalid,
            SensorError::Network { .. } => ErrorCode::ConnectionFailed,
            SensorError::Timeout { .. } => ErrorCode::ConnectionTimeout,
            SensorError::HttpStatus { .. } => ErrorCode::UpstreamStatus,
            SensorError::InvalidBody { .. } | SensorError::Json(_) => ErrorCode::ParsingFailed,
            SensorError::Query { .. } => ErrorCode::QueryFailed,
            SensorError::FieldNotConfigured(_) => ErrorCode::FieldNotConfigured,
            SensorError::FieldUnavailable(_) => ErrorCode::FieldUnavailable,
            SensorError::UnknownField(_) => ErrorCode::UnknownField,
        }
    }

    /// True for failures of the fetch itself (network, timeout, status, body)
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            SensorError::Network { .. }
                | SensorError::Timeout { .. }
                | SensorError::HttpStatus { .. }
                | SensorError::InvalidBody { .. }
        )
    }

    /// Whether the next poll may succeed without configuration changes
    pub fn is_retryable(&self) -> bool {
        match self {
            SensorError::Network { .. } | SensorError::Timeout { .. } => true,
            SensorError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            SensorError::InvalidBody { .. } | SensorError::FieldUnavailable(_) => true,
            _ => false,
        }
    }
}
