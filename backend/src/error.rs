//! Error types for the expview pipeline.
//!
//! - [`RowError`] - One rejected CSV row
//! - [`IngestError`] - File-level ingestion failures
//! - [`SessionError`] - Session blob persistence errors
//! - [`ExportError`] - CSV serialization errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Row Validation Errors
// =============================================================================

/// Why a single row was rejected. `row` is the 1-based data row index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("Row {row}: {field} must be a non-empty string")]
    EmptyField { row: usize, field: &'static str },

    #[error("Row {row}: step must be a non-negative number")]
    InvalidStep { row: usize },

    #[error("Row {row}: step must be a whole number")]
    FractionalStep { row: usize },

    #[error("Row {row}: value must be a valid number")]
    InvalidValue { row: usize },
}

impl RowError {
    /// 1-based index of the offending row.
    pub fn row(&self) -> usize {
        match self {
            RowError::EmptyField { row, .. }
            | RowError::InvalidStep { row }
            | RowError::FractionalStep { row }
            | RowError::InvalidValue { row } => *row,
        }
    }

    /// Name of the offending column.
    pub fn field(&self) -> &'static str {
        match self {
            RowError::EmptyField { field, .. } => field,
            RowError::InvalidStep { .. } | RowError::FractionalStep { .. } => "step",
            RowError::InvalidValue { .. } => "value",
        }
    }
}

// =============================================================================
// Ingestion Errors
// =============================================================================

/// File-level ingestion failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// Header lacks required columns. Reported before any row is read.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// First invalid row; the whole file is rejected.
    #[error(transparent)]
    InvalidRow(#[from] RowError),

    /// Header present but no data rows.
    #[error("CSV file is empty or contains no valid data")]
    EmptyInput,

    /// Source could not be read or decoded.
    #[error("Failed to read CSV file: {0}")]
    Read(String),

    /// Malformed delimited text.
    #[error("Failed to parse CSV: {0}")]
    Parse(String),
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Read(e.to_string())
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            IngestError::Read(e.to_string())
        } else {
            IngestError::Parse(e.to_string())
        }
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors while saving or loading the session blob.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Store IO error.
    #[error("Session store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob is not valid JSON.
    #[error("Session JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blob does not match the session schema.
    #[error("Session blob rejected: {}", .0.join("; "))]
    Schema(Vec<String>),

    /// Invalid store key.
    #[error("Invalid session key: {0}")]
    InvalidKey(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Another upload is still being processed.
    #[error("An ingestion is already in progress")]
    IngestInProgress,

    /// Session persistence failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Export failed.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV reading and ingestion internals.
pub type CsvResult<T> = Result<T, IngestError>;

/// Result type for session persistence.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for export serialization.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
