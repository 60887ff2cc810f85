//! Error types for receipt-check.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, verifying or exporting receipts.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed manual fiscal parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// QR image path does not exist.
    #[error("QR image file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Network-level failure talking to the verification service.
    #[error("network error: {0}")]
    Transport(String),

    /// Terminal response from the verification service.
    #[error("service returned code {code}: {message}")]
    Api {
        /// Status code reported by the service.
        code: i64,
        /// Human-readable reason.
        message: String,
    },

    /// All attempts were consumed without a success or terminal response.
    #[error("max retries exceeded: {0}")]
    RetryExhausted(String),

    /// Verification was cancelled while waiting to retry.
    #[error("verification cancelled")]
    Cancelled,

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
