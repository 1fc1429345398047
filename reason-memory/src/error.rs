//! Episodic memory errors (§7 "Memory file corruption").

/// Errors from [`crate::MemoryStore`] operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Underlying filesystem operation failed (read, write, or rename).
    #[error("memory store I/O error: {0}")]
    Io(String),
}
