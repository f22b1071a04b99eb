//! Error types for pymaps map acquisition and resolution.
//!
//! All failures in this crate derive from a single root error kind so
//! callers can match on one enum regardless of which stage failed.

use thiserror::Error;

/// Main error type for pymaps operations.
#[derive(Debug, Error)]
pub enum PymapsError {
    /// The per-process maps listing could not be opened: the process has
    /// exited or is not inspectable. Not retriable at this layer.
    #[error("No such process or its maps cannot be inspected: {0}")]
    ProcessNotFound(u32),

    /// No map with the exact target executable path exists. The message
    /// either lists executable-looking candidate paths (to help diagnose a
    /// renamed or relocated binary) or states that no executable maps are
    /// available at all.
    #[error("{0}")]
    MissingExecutableMaps(String),

    /// More than one distinct libpython is mapped into the process; the
    /// resolver refuses to guess which copy belongs to the interpreter.
    #[error("Multiple libpython maps found: {0}")]
    AmbiguousLibraryMaps(String),
}

/// Result type alias for pymaps operations
pub type Result<T> = std::result::Result<T, PymapsError>;
