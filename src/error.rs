//! Error types for the iTop client.
//!
//! This module defines `ItopError`, the unified error type used throughout
//! the crate for consistent error handling and propagation.
//!
//! # Security
//!
//! Error messages must never carry the account password. Use
//! `sanitize_message()` when building messages from server-supplied text.

use std::time::Duration;
use thiserror::Error;

use crate::models::StatusCode;

/// Unified error type for all iTop operations.
///
/// The variants fall into four groups: transport failures (the HTTP round
/// trip did not produce a 200), API failures (iTop answered with a non-zero
/// `code`), malformed responses, and local configuration problems.
#[derive(Error, Debug)]
pub enum ItopError {
    /// Configuration error - missing or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The endpoint answered with a status other than 200.
    #[error("iTop API returned status code {status}: {body}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: reqwest::StatusCode,
        /// The full response body, with the password redacted.
        body: String,
    },

    /// Request timed out.
    #[error("request timed out after {duration:?} - the server may be slow or unreachable")]
    Timeout {
        /// The configured timeout that elapsed.
        duration: Duration,
    },

    /// iTop returned a non-zero application status code.
    #[error("iTop API returned error code {} ({status}): {message}", .status.code())]
    Api {
        /// The mapped status code.
        status: StatusCode,
        /// The message iTop sent alongside the code.
        message: String,
    },

    /// The response envelope is missing a required field or has the wrong shape.
    #[error("invalid response returned from iTop: {0}")]
    InvalidResponse(String),

    /// The numeric status code is not part of the documented enumeration.
    #[error("unknown iTop status code: {0}")]
    UnknownStatusCode(i64),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection test failed.
    #[error("connection test failed: {message}")]
    ConnectionTest {
        /// Details about why the connection test failed.
        message: String,
    },
}

impl ItopError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        ItopError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ItopError::Config(message.into())
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        ItopError::InvalidResponse(message.into())
    }

    /// Creates an API error from a mapped status code.
    pub fn api(status: StatusCode, message: impl Into<String>) -> Self {
        ItopError::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a connection test error.
    pub fn connection_test(message: impl Into<String>) -> Self {
        ItopError::ConnectionTest {
            message: message.into(),
        }
    }

    /// Returns true if the failure happened before iTop produced a usable
    /// response: a non-200 status, a timeout, or a network error.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ItopError::HttpStatus { .. } | ItopError::Timeout { .. } | ItopError::Http(_)
        )
    }

    /// Returns the mapped status code for API errors.
    #[must_use]
    pub fn api_status(&self) -> Option<StatusCode> {
        match self {
            ItopError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Sanitizes an error message to remove any occurrence of a secret.
    ///
    /// Returns the message with the secret replaced by `[REDACTED]`.
    #[must_use]
    pub fn sanitize_message(message: &str, secret: &str) -> String {
        if secret.is_empty() {
            return message.to_string();
        }
        message.replace(secret, "[REDACTED]")
    }

    /// Creates a sanitized version of this error's display message.
    #[must_use]
    pub fn sanitized_display(&self, secret: &str) -> String {
        Self::sanitize_message(&self.to_string(), secret)
    }
}
