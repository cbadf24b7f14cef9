//! Error types for the leaguegrid extraction engine.
//!
//! This module defines the error hierarchy:
//!
//! - [`IngestError`] - Source text could not be turned into a grid
//! - [`ExtractError`] - A structural precondition of a table shape failed
//! - [`ShapeError`] - Table shape configuration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Structural errors are terminal for the table being built. Row-level
//! problems never surface here; they are reported as skipped rows in the
//! assembly diagnostics instead.

use thiserror::Error;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning raw source text into a [`crate::models::Grid`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Neither a JSON table nor well-formed delimited text.
    #[error("source not decodable: {0}")]
    SourceDecode(String),

    /// Failed to decode bytes into text.
    #[error("Failed to decode source bytes: {0}")]
    Encoding(String),

    /// Failed to read the source.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Extraction Errors
// =============================================================================

/// Structural failures while discovering or assembling a table.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source itself could not be ingested.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A mandatory anchor column (e.g. "Team") is absent.
    #[error("Required column not found: '{label}'")]
    RequiredColumnNotFound { label: String },

    /// A marker row required by the table shape is absent.
    #[error("Required marker row not found: {}", .phrases.join(" + "))]
    RequiredMarkerNotFound { phrases: Vec<String> },

    /// A discovered block is narrower than the shape's hard minimum.
    #[error("Section too small for '{shape}': {found} columns, need at least {minimum}")]
    SectionTooSmall {
        shape: String,
        found: usize,
        minimum: usize,
    },

    /// The shape asked for a section index that was not discovered.
    #[error("Section {index} requested but only {found} discovered")]
    SectionOutOfRange { index: usize, found: usize },
}

impl ExtractError {
    /// Short machine-readable name of the violated precondition.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Ingest(_) => "SourceDecodeError",
            ExtractError::RequiredColumnNotFound { .. } => "RequiredColumnNotFound",
            ExtractError::RequiredMarkerNotFound { .. } => "RequiredMarkerNotFound",
            ExtractError::SectionTooSmall { .. } => "SectionTooSmall",
            ExtractError::SectionOutOfRange { .. } => "SectionOutOfRange",
        }
    }

    /// Attach the table shape name to a size error raised below the shape layer.
    pub fn for_shape(self, name: &str) -> Self {
        match self {
            ExtractError::SectionTooSmall { found, minimum, .. } => ExtractError::SectionTooSmall {
                shape: name.to_string(),
                found,
                minimum,
            },
            other => other,
        }
    }
}

// =============================================================================
// Shape Errors
// =============================================================================

/// Errors from table shape configuration.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// No shape with this name is known.
    #[error("Unknown table shape: {0}")]
    UnknownShape(String),

    /// Shape document is structurally invalid.
    #[error("Invalid table shape: {0}")]
    Invalid(String),

    /// IO error.
    #[error("Shape IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Shape JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Extraction error.
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Shape lookup or parsing error.
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for shape operations.
pub type ShapeResult<T> = Result<T, ShapeError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
