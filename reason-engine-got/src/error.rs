//! Graph-of-Thoughts engine errors.

/// Errors from a [`crate::GotEngine::reason`] run.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GotError {
    /// Every provider in the fallback chain failed on the final-answer call
    /// (the one call the engine cannot simply skip and keep going from,
    /// §4.9 step 3).
    #[error("final answer generation failed: {0}")]
    FinalAnswerFailed(String),
    /// The run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}
