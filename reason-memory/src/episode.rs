//! Episode record shape (§3 "Reflexion episode").

use serde::{Deserialize, Serialize};

/// One (problem, attempt) tuple persisted for future reflexion runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Stable unique id.
    pub id: String,
    /// The problem statement as submitted.
    pub problem: String,
    /// Normalized hash of `problem` (lowercased, whitespace-collapsed),
    /// used for exact-match lookup.
    pub problem_hash: String,
    /// Which attempt within the reflexion run this episode records.
    pub attempt_number: u32,
    /// Thought steps produced during the attempt.
    pub thoughts: Vec<String>,
    /// The attempt's final answer text.
    pub final_answer: String,
    /// Whether the attempt was judged successful.
    pub was_successful: bool,
    /// Why the attempt failed, when `was_successful` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Free-text self-reflection produced after a failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    /// When this episode was stored.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Which provider produced the attempt.
    pub provider_name: String,
}

impl Episode {
    /// Build a new episode, stamping `id` and `timestamp`. `problem_hash`
    /// is computed from `problem` via [`crate::similarity::normalize`].
    #[must_use]
    pub fn new(
        problem: impl Into<String>,
        attempt_number: u32,
        thoughts: Vec<String>,
        final_answer: impl Into<String>,
        was_successful: bool,
        provider_name: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let problem_hash = crate::similarity::normalize(&problem);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            problem,
            problem_hash,
            attempt_number,
            thoughts,
            final_answer: final_answer.into(),
            was_successful,
            failure_reason: None,
            reflection: None,
            timestamp: chrono::Utc::now(),
            provider_name: provider_name.into(),
        }
    }

    /// Set `failure_reason`.
    #[must_use]
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Set `reflection`.
    #[must_use]
    pub fn with_reflection(mut self, reflection: impl Into<String>) -> Self {
        self.reflection = Some(reflection.into());
        self
    }
}
