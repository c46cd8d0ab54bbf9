//! Storage error types.

use thiserror::Error;

/// Errors from storage operations.
///
/// Deliberately narrow: lookups for unknown threads return empty results
/// rather than errors, because "this thread exists" is information the
/// server must not hand out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying store failure (lock poisoning, file system, database).
    #[error("storage I/O error: {0}")]
    Io(String),
}
