//! Error types for mresearch
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for mresearch operations
///
/// Covers configuration loading, client-side request validation,
/// backend API failures, local store access, and transport errors.
#[derive(Error, Debug)]
pub enum MresearchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-side validation rejected a request before it was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend answered with a non-success status
    #[error("API error ({status}): {}", .detail.as_deref().unwrap_or("no detail provided"))]
    Api {
        /// HTTP status code returned by the backend
        status: u16,
        /// The `detail` field of the backend error payload, when present
        detail: Option<String>,
    },

    /// Local record store errors (database operations, migrations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors (connection refused, timeouts, bad bodies)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for mresearch operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Extract the message a user should see for a failed operation
///
/// Backend errors carrying a `detail` payload surface that detail verbatim,
/// and validation errors surface their own message. Everything else
/// (transport failures, missing detail, storage problems) degrades to the
/// supplied fallback.
///
/// # Examples
///
/// ```
/// use mresearch::error::{user_message, MresearchError};
///
/// let err: anyhow::Error = MresearchError::Api {
///     status: 404,
///     detail: Some("Research not found".to_string()),
/// }
/// .into();
/// assert_eq!(user_message(&err, "Failed to load"), "Research not found");
///
/// let err = anyhow::anyhow!("connection reset");
/// assert_eq!(user_message(&err, "Failed to load"), "Failed to load");
/// ```
pub fn user_message(err: &anyhow::Error, fallback: &str) -> String {
    match err.downcast_ref::<MresearchError>() {
        Some(MresearchError::Api {
            detail: Some(detail),
            ..
        }) => detail.clone(),
        Some(MresearchError::Validation(msg)) => msg.clone(),
        _ => fallback.to_string(),
    }
}
