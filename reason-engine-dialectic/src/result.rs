//! The outcome of a [`crate::engine::DialecticEngine::reason`] run.

use serde::Serialize;

/// The verification status attached to a [`Claim`] (§3 "verification").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// A verification call returned and was judged (parsed structurally or
    /// recovered via the lenient text heuristic).
    Verified,
    /// A verification call errored entirely; `score=0.5`, `is_valid=false`
    /// — not to be treated as confirmation (§4.11 "Verification").
    Unverified,
    /// Fast mode: no verification was performed at all.
    Skipped,
}

/// A structured self-critique of one claim (§3 "verification").
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    /// Whether the claim is judged valid.
    pub is_valid: bool,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Verification status.
    pub status: VerificationStatus,
    /// Identified issues.
    pub issues: Vec<String>,
    /// Identified strengths.
    pub strengths: Vec<String>,
    /// A suggestion for improving the claim.
    pub suggestion: String,
    /// Truncated outputs of any tool calls used as evidence.
    pub tool_results: Vec<String>,
    /// Why verification didn't run/complete, set iff `status = Unverified`.
    pub error_reason: Option<String>,
}

impl Verification {
    /// Build the `status = Unverified` record used when a verification
    /// call errors entirely (§4.11 "Verification").
    #[must_use]
    pub fn unverified(error_reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            score: 0.5,
            status: VerificationStatus::Unverified,
            issues: Vec::new(),
            strengths: Vec::new(),
            suggestion: String::new(),
            tool_results: Vec::new(),
            error_reason: Some(error_reason.into()),
        }
    }

    /// Build the `status = Skipped` record fast mode assigns to all three
    /// claims (§4.11 "Fast mode").
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            is_valid: true,
            score: 0.0,
            status: VerificationStatus::Skipped,
            issues: Vec::new(),
            strengths: Vec::new(),
            suggestion: String::new(),
            tool_results: Vec::new(),
            error_reason: None,
        }
    }
}

/// A model-produced assertion together with its verification (§3 "Claim").
#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    /// The claim's text.
    pub content: String,
    /// Its verification record.
    pub verification: Verification,
}

/// One round of thesis/antithesis/synthesis (§3 "Dialectic step").
#[derive(Debug, Clone, Serialize)]
pub struct DialecticStep {
    /// 1-based round number.
    pub round: u32,
    /// The thesis claim.
    pub thesis: Claim,
    /// The antithesis claim.
    pub antithesis: Claim,
    /// The synthesis claim.
    pub synthesis: Claim,
    /// Whether this round's synthesis met the resolution criteria (§4.11
    /// "Normal mode" — valid, no issues, score >= confidence_target).
    pub resolved: bool,
}

/// A snapshot of a completed (or exhausted) dialectic run.
#[derive(Debug, Clone, Serialize)]
pub struct DialecticResult {
    /// The final answer: the resolving round's synthesis, or the best-seen
    /// synthesis across all rounds if none resolved.
    pub answer: String,
    /// Whether a round resolved (met validity + confidence_target).
    pub success: bool,
    /// The confidence (synthesis verification score) of `answer`.
    pub confidence: f64,
    /// Total rounds run (1 in fast mode).
    pub total_rounds: u32,
    /// Every round's full step record, in order.
    pub steps: Vec<DialecticStep>,
}
