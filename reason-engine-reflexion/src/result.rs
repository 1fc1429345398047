//! The outcome of a [`crate::engine::ReflexionEngine::reason`] run.

use serde::Serialize;

/// A record of a single attempt within a run, regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Thought steps the model produced for this attempt.
    pub thoughts: Vec<String>,
    /// The attempt's final answer.
    pub answer: String,
    /// The evaluator's score for this attempt, in `[0, 1]`.
    pub score: f64,
    /// Whether this attempt was judged successful.
    pub success: bool,
    /// Why the attempt failed, when not successful.
    pub failure_reason: Option<String>,
    /// The self-reflection generated after this attempt, when it failed.
    pub reflection: Option<String>,
}

/// A snapshot of a completed (or exhausted) reflexion run.
#[derive(Debug, Clone, Serialize)]
pub struct ReflexionResult {
    /// The final answer returned to the caller.
    pub answer: String,
    /// Whether `answer` came from an attempt the evaluator judged
    /// successful (`true`), versus the best-scoring attempt returned after
    /// exhausting `max_attempts` (`false`).
    pub success: bool,
    /// Every attempt made during the run, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Lessons pulled from episodic memory at the start of this run and
    /// folded into the first attempt's prompt (§4.8, §8 scenario 5).
    pub lessons_learned: Vec<String>,
}
