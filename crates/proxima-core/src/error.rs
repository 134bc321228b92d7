//! Error types for Proxima.
//!
//! Every fallible operation of the engine returns [`Result`]. The binding
//! layer that sits on top of the core maps [`Error::kind`] onto whatever
//! convention its host prefers (status code, exception, result value), so
//! the variants here stay independent of any reporting mechanism.

use crate::ObjectId;
use thiserror::Error;

/// Result type alias for Proxima operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dimension or encoding mismatch, or otherwise malformed input.
    InvalidArgument,
    /// Unknown or removed object requested as live.
    NotFound,
    /// Search attempted before any node was linked.
    NotReady,
    /// Operation attempted after the index was closed.
    ClosedIndex,
    /// Persisted index files are missing, truncated or inconsistent.
    CorruptIndex,
    /// Allocation failure or identifier space exhausted.
    ResourceExhausted,
    /// Filesystem failure while writing an index.
    Io,
}

/// Errors that can occur in Proxima operations.
///
/// Error codes follow the pattern `PRX-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// Vector length differs from the configured dimension (PRX-001).
    #[error("[PRX-001] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the index property.
        expected: usize,
        /// Length of the rejected vector.
        actual: usize,
    },

    /// Invalid argument (PRX-002).
    #[error("[PRX-002] Invalid argument: {0}")]
    InvalidArgument(String),

    /// Object not found or removed (PRX-003).
    #[error("[PRX-003] Object {0} not found")]
    ObjectNotFound(ObjectId),

    /// Search issued before the first build (PRX-004).
    #[error("[PRX-004] Index not ready: no object has been linked into the graph yet")]
    NotReady,

    /// Index already closed (PRX-005).
    #[error("[PRX-005] Index is closed")]
    ClosedIndex,

    /// Corrupt or foreign index files (PRX-006).
    #[error("[PRX-006] Index corrupted: {0}")]
    CorruptIndex(String),

    /// Out of memory or identifiers (PRX-007).
    #[error("[PRX-007] Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// IO error (PRX-008).
    #[error("[PRX-008] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (PRX-009).
    ///
    /// Indicates a broken internal invariant. Please report if encountered.
    #[error("[PRX-009] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "PRX-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "PRX-001",
            Self::InvalidArgument(_) => "PRX-002",
            Self::ObjectNotFound(_) => "PRX-003",
            Self::NotReady => "PRX-004",
            Self::ClosedIndex => "PRX-005",
            Self::CorruptIndex(_) => "PRX-006",
            Self::ResourceExhausted(_) => "PRX-007",
            Self::Io(_) => "PRX-008",
            Self::Internal(_) => "PRX-009",
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DimensionMismatch { .. } | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ObjectNotFound(_) => ErrorKind::NotFound,
            Self::NotReady => ErrorKind::NotReady,
            Self::ClosedIndex => ErrorKind::ClosedIndex,
            Self::CorruptIndex(_) | Self::Internal(_) => ErrorKind::CorruptIndex,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Non-recoverable errors include corruption and internal errors.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CorruptIndex(_) | Self::Internal(_))
    }

    /// Maps an IO error raised while reading persisted files.
    ///
    /// A missing component file is as fatal as a truncated one: both
    /// become `CorruptIndex`.
    pub(crate) fn from_load_io(context: &str, err: &std::io::Error) -> Self {
        Self::CorruptIndex(format!("{context}: {err}"))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::ResourceExhausted(err.to_string())
    }
}
