//! Reflexion engine errors.

/// Errors from a [`crate::ReflexionEngine::reason`] run.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ReflexionError {
    /// Every provider in the fallback chain failed to produce even a first
    /// attempt (the one call the engine cannot recover from by reflecting).
    #[error("attempt generation failed: {0}")]
    AttemptFailed(String),
    /// The run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// The episodic memory store returned an error while loading lessons or
    /// storing an episode.
    #[error("memory error: {0}")]
    Memory(#[from] reason_memory::MemoryError),
}
