//! Error types for sevmeter
//!
//! The API client classifies every failure it sees into one of the variants
//! below before logging it and handing `None` to its caller. Configuration
//! and startup code propagate the same type with `?`.

use thiserror::Error;

/// Result type alias for sevmeter operations
pub type Result<T> = std::result::Result<T, SevError>;

/// Main error type for sevmeter
#[derive(Debug, Error)]
pub enum SevError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Login rejected or login endpoint unreachable
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Timeout or connection error on any call
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The server answered but there was nothing to decode
    #[error("Empty response from {endpoint}")]
    EmptyResponse { endpoint: String },

    /// HTTP status >= 300
    #[error("HTTP status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// Response payload did not have the expected shape
    #[error("API error: {message}")]
    Api { message: String },

    /// HTTP server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
}

impl SevError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SevError::Config {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        SevError::Auth {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        SevError::Transport {
            message: message.into(),
        }
    }

    /// Transport error for an expired deadline
    pub fn timeout<S: Into<String>>(endpoint: S, secs: u64) -> Self {
        SevError::Transport {
            message: format!("{} timed out after {}s", endpoint.into(), secs),
        }
    }

    pub fn empty_response<S: Into<String>>(endpoint: S) -> Self {
        SevError::EmptyResponse {
            endpoint: endpoint.into(),
        }
    }

    pub fn status<S: Into<String>>(endpoint: S, status: u16) -> Self {
        SevError::Status {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        SevError::Api {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        SevError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        SevError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        SevError::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SevError {
    fn from(err: std::io::Error) -> Self {
        SevError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SevError {
    fn from(err: serde_yaml::Error) -> Self {
        SevError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SevError {
    fn from(err: serde_json::Error) -> Self {
        SevError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SevError {
    fn from(err: reqwest::Error) -> Self {
        SevError::transport(err.to_string())
    }
}
