//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Non-success status or transport failure while listing or fetching from JIRA.
    /// The raw status and body are kept for diagnostics.
    #[error("Fetch from {url} failed ({status}): {body}")]
    FetchFailed {
        url: String,
        status: u16,
        body: String,
    },

    /// Malformed JSON or a missing required field in an issue document.
    #[error("Failed to parse {origin}: {message}")]
    ParseFailed { origin: String, message: String },

    /// An operation referenced a source key with no target issue number yet.
    /// This is an ordering-invariant violation and is never retried.
    #[error("Issue key {0} was not mapped")]
    UnmappedKey(String),

    /// Non-success status from GitHub while creating an issue or comment.
    #[error("Creation failed ({status}): {message}")]
    CreateFailed { status: u16, message: String },

    /// Non-success status from GitHub while updating an issue body.
    #[error("Update failed ({status}): {message}")]
    UpdateFailed { status: u16, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
