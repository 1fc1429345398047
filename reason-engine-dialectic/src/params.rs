//! Tunable parameters for a single [`crate::DialecticEngine::reason`] run
//! (§4.11).

/// Parameters governing one dialectic run.
#[derive(Debug, Clone)]
pub struct DialecticParams {
    /// Skip the full thesis/antithesis/synthesis/verification pipeline and
    /// generate all three positions in a single model call instead, with
    /// every verification reported as [`crate::VerificationStatus::Skipped`]
    /// (§4.11 "Fast mode").
    pub fast_mode: bool,
    /// Base sampling temperature for the thesis call. The antithesis and
    /// synthesis calls offset from this (§4.11 "temperature offsets") so
    /// the three positions don't collapse to near-identical text.
    pub temperature: f64,
    /// Requested max output tokens for every generation call in the run
    /// (§6 `max_tokens`). `<= 0` means "unspecified", per §3 "Chat options".
    pub max_tokens: i64,
    /// Whether verification may request tool-backed evidence.
    pub enable_tools: bool,
    /// Tool names verification may invoke; empty means "all enabled tools".
    pub enabled_tools: Vec<String>,
    /// Maximum tool calls a single position's verification may make.
    pub max_tool_calls_per_verification: u32,
    /// Maximum tool calls across all three verifications combined, enforced
    /// via a shared counter (§4.11 "shared tool-call budget").
    pub max_tool_calls_total: u32,
    /// Maximum rounds before returning the best-seen synthesis (§4.11
    /// "Normal mode").
    pub max_rounds: u32,
    /// Score above which an unresolved round's synthesis still becomes the
    /// new "current best" carried into exhaustion (§4.11 "Normal mode").
    pub verify_threshold: f64,
    /// Score a synthesis must meet (alongside validity and no issues) to
    /// resolve a round (§4.11 "Normal mode", §3 "Resolved round").
    pub confidence_target: f64,
    /// Per-phase model override for the thesis call, taking priority over
    /// the provider default (§6 `thesis_model`).
    pub thesis_model: Option<String>,
    /// Per-phase model override for the antithesis call (§6 `antithesis_model`).
    pub antithesis_model: Option<String>,
    /// Per-phase model override for the synthesis call (§6 `synthesis_model`).
    pub synthesis_model: Option<String>,
}

impl Default for DialecticParams {
    fn default() -> Self {
        Self {
            fast_mode: false,
            temperature: 0.7,
            max_tokens: 0,
            enable_tools: false,
            enabled_tools: Vec::new(),
            max_tool_calls_per_verification: 2,
            max_tool_calls_total: 6,
            max_rounds: 3,
            verify_threshold: 0.6,
            confidence_target: 0.85,
            thesis_model: None,
            antithesis_model: None,
            synthesis_model: None,
        }
    }
}
