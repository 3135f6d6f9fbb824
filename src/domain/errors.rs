//! Domain error types
//!
//! This module defines the error hierarchy for Tidemark.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Tidemark error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network/connection errors against the row source or the blob store
    #[error("Connection error: {0}")]
    Connection(String),

    /// Row source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Output serialization or destination errors
    #[error("Sink error: {0}")]
    Sink(String),

    /// Remote object storage errors
    #[error("Blob storage error: {0}")]
    Blob(String),

    /// Watermark state management errors
    #[error("State management error: {0}")]
    State(String),

    /// Update addressed an entity the store does not track
    #[error("Entity not found in state: {0}")]
    EntityNotFound(String),

    /// Commit would move a watermark backwards
    #[error("Watermark for '{entity}' cannot move from {current} back to {proposed}")]
    WatermarkRegression {
        entity: String,
        current: String,
        proposed: String,
    },

    /// Query template errors
    #[error("Template error: {0}")]
    Template(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation abandoned because shutdown was requested
    #[error("Cancelled during {0}")]
    Cancelled(String),

    /// Operation abandoned because the run deadline passed
    #[error("Timed out during {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// An error annotated with the operation that produced it
    #[error("{op}: {source}")]
    Context {
        op: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Wraps the error with the name of the failing operation
    pub fn context(self, op: impl Into<String>) -> Self {
        SyncError::Context {
            op: op.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through any context wrappers
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the error came from a shutdown request or the run deadline
    pub fn is_interruption(&self) -> bool {
        matches!(
            self.root(),
            SyncError::Cancelled(_) | SyncError::Timeout(_)
        )
    }

    /// True when the error means the row source or blob store was unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.root(),
            SyncError::Connection(_) | SyncError::Source(SourceError::Connect(_))
        )
    }
}

/// Row source errors
///
/// Iteration and scan failures are kept apart so callers can tell a broken
/// cursor from a single row that could not be decoded.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to obtain a connection
    #[error("Failed to connect to source: {0}")]
    Connect(String),

    /// Query could not be prepared or executed
    #[error("Query failed: {0}")]
    Query(String),

    /// Query parameter could not be bound
    #[error("Invalid query parameter: {0}")]
    Parameter(String),

    /// Cursor failed while advancing to the next row
    #[error("Row iteration failed: {0}")]
    Iteration(String),

    /// Current row could not be decoded
    #[error("Row scan failed: {0}")]
    Scan(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv writer errors
impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::Sink(err.to_string())
    }
}
