//! Trafficount Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Client-caused: a report payload is missing or has malformed fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Service-caused: the report store could not be opened, written or read.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The report could not be handed to the ingestion service.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("Detection source unavailable: {0}")]
    DetectionSource(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the error was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::JsonError(_))
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}
