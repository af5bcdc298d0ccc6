//! Error types for the PyPI Downloads MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Errors fall into two groups: recoverable ones (a rejected or malformed query) that
//! the query agent folds back into the generation loop, and terminal ones that are
//! surfaced to the MCP client as a failed tool call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// The generated statement failed the local structural check.
    #[error("{message}")]
    Validation { message: String },

    /// The warehouse rejected the statement as malformed (HTTP 400 / invalidQuery).
    #[error("Invalid query: {message}")]
    BadRequest {
        message: String,
        /// e.g., "invalidQuery"
        reason: Option<String>,
    },

    #[error("Warehouse error ({status}): {message}")]
    Warehouse {
        status: u16,
        message: String,
        /// e.g., "accessDenied", "quotaExceeded"
        reason: Option<String>,
    },

    #[error("Credentials error: {message}")]
    Credentials { message: String, suggestion: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a bad request error with an optional BigQuery reason code.
    pub fn bad_request(message: impl Into<String>, reason: Option<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            reason,
        }
    }

    /// Create a terminal warehouse error.
    pub fn warehouse(status: u16, message: impl Into<String>, reason: Option<String>) -> Self {
        Self::Warehouse {
            status,
            message: message.into(),
            reason,
        }
    }

    /// Create a credentials error with a helpful suggestion.
    pub fn credentials(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
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
            Self::Credentials { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Warehouse { status: 403, .. } => {
                Some("Check that the credentials can run BigQuery jobs in the billing project")
            }
            _ => None,
        }
    }

    /// Check if this error should be fed back to the generator for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::BadRequest { .. })
    }
}

/// Convert reqwest errors to AgentError.
impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::timeout("warehouse request", 0)
        } else if err.is_decode() {
            AgentError::internal(format!("Failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            AgentError::warehouse(status.as_u16(), err.to_string(), None)
        } else {
            AgentError::connection(
                format!("HTTP request failed: {}", err),
                "Check network connectivity to Google APIs",
            )
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert AgentError to MCP ErrorData for semantic error categorization.
impl From<AgentError> for rmcp::ErrorData {
    fn from(err: AgentError) -> Self {
        match &err {
            // Caller-correctable problems -> invalid_params
            AgentError::InvalidInput { .. }
            | AgentError::Validation { .. }
            | AgentError::BadRequest { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            AgentError::Timeout { .. } => rmcp::ErrorData::internal_error(
                err.to_string(),
                suggestion_data(Some("Try a narrower question or a shorter date range")),
            ),

            AgentError::Warehouse { .. }
            | AgentError::Credentials { .. }
            | AgentError::Connection { .. }
            | AgentError::Generation { .. }
            | AgentError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(err.suggestion()))
            }
        }
    }
}
