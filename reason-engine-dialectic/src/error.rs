//! Dialectic engine errors.

/// Errors from a [`crate::DialecticEngine::reason`] run.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DialecticError {
    /// Every provider in the fallback chain failed on the thesis call (the
    /// one call with nothing yet to fall back to).
    #[error("thesis generation failed: {0}")]
    ThesisFailed(String),
    /// The run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}
