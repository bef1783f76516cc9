//! Error types for the retrieval engine.
//!
//! This module provides a unified error type for every store and component in
//! the engine, following the taxonomy of extraction/embedding/persistence
//! failures the coordinator distinguishes between.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in retrieval-engine operations.
///
/// Each variant includes a descriptive error message. Error codes follow the
/// pattern `WASHI-XXX` for easy debugging and log correlation.
#[derive(Error, Debug)]
pub enum Error {
    /// PDF/page extraction produced no usable pages (WASHI-001).
    #[error("[WASHI-001] extraction failed for '{0}'")]
    ExtractionFailure(String),

    /// All pages were filtered out as non-content (WASHI-002).
    #[error("[WASHI-002] no content pages in '{0}'")]
    NoContent(String),

    /// The embedder collaborator failed or returned malformed output (WASHI-003).
    #[error("[WASHI-003] embedder failure: {0}")]
    EmbedderFailure(String),

    /// The reranker collaborator failed (WASHI-004).
    #[error("[WASHI-004] reranker failure: {0}")]
    RerankerFailure(String),

    /// Disk or I/O failure during save/flush (WASHI-005).
    #[error("[WASHI-005] persistence failure: {0}")]
    PersistenceFailure(String),

    /// `verify()` detected a size mismatch between C1/C2/C3 (WASHI-006).
    ///
    /// Unrecoverable in place; remediation is re-indexing from source.
    #[error("[WASHI-006] integrity failure: {0}")]
    IntegrityFailure(String),

    /// Corrupted on-disk blob: truncated posting, unexpected state JSON, etc (WASHI-007).
    ///
    /// Unrecoverable in place; refuse to load rather than attempt partial recovery.
    #[error("[WASHI-007] format error: {0}")]
    FormatError(String),

    /// Vector dimension mismatch (WASHI-008).
    #[error("[WASHI-008] vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Invalid configuration value (WASHI-009).
    #[error("[WASHI-009] configuration error: {0}")]
    Config(String),

    /// SQLite error (WASHI-010).
    #[error("[WASHI-010] sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error (WASHI-011).
    #[error("[WASHI-011] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error (WASHI-012).
    #[error("[WASHI-012] serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violated (WASHI-013).
    #[error("[WASHI-013] internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "WASHI-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ExtractionFailure(_) => "WASHI-001",
            Self::NoContent(_) => "WASHI-002",
            Self::EmbedderFailure(_) => "WASHI-003",
            Self::RerankerFailure(_) => "WASHI-004",
            Self::PersistenceFailure(_) => "WASHI-005",
            Self::IntegrityFailure(_) => "WASHI-006",
            Self::FormatError(_) => "WASHI-007",
            Self::DimensionMismatch { .. } => "WASHI-008",
            Self::Config(_) => "WASHI-009",
            Self::Sqlite(_) => "WASHI-010",
            Self::Io(_) => "WASHI-011",
            Self::Serialization(_) => "WASHI-012",
            Self::Internal(_) => "WASHI-013",
        }
    }

    /// Returns true if this error is recoverable by the caller (e.g. skip this
    /// file and continue ingest) rather than requiring a full re-index.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::IntegrityFailure(_) | Self::FormatError(_) | Self::Internal(_)
        )
    }
}
