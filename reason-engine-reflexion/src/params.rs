//! Tunable parameters for a single [`crate::ReflexionEngine::reason`] run
//! (§4.10).

/// Parameters governing one reflexion run.
#[derive(Debug, Clone)]
pub struct ReflexionParams {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Maximum number of inner-loop iterations (thought or tool steps)
    /// within a single attempt before forcing a final answer (§4.10 step
    /// 3a: "an inner reasoning loop, up to `max_thoughts_per_attempt`
    /// iterations").
    pub max_thoughts_per_attempt: u32,
    /// Sampling temperature for attempt generation.
    pub temperature: f64,
    /// Whether tool actions are permitted during an attempt.
    pub enable_tools: bool,
    /// Maximum tool calls allowed per attempt (not per run).
    pub max_tool_calls_per_attempt: u32,
    /// Tool names the model may invoke; empty means "all enabled tools".
    pub enabled_tools: Vec<String>,
    /// Whether to consult episodic memory for lessons from past runs on a
    /// similar problem, at the start of this run (§4.8, §4.10 step 0).
    pub use_memory: bool,
}

impl Default for ReflexionParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_thoughts_per_attempt: 5,
            temperature: 0.7,
            enable_tools: false,
            max_tool_calls_per_attempt: 3,
            enabled_tools: Vec::new(),
            use_memory: true,
        }
    }
}
