//! Prompt construction and response parsing for each model call a
//! [`crate::engine::DialecticEngine`] run makes (§4.11).

use serde::Deserialize;
use serde_json::Value;

/// Extract the first balanced top-level JSON value (object or array) from
/// free-form model text, tolerating prose/code fences around it. Mirrors
/// the extraction used by the graph-of-thoughts and reflexion engines.
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let (open, close) = match b {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => continue,
        };
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escape = false;
        for (j, &c) in bytes[i..].iter().enumerate() {
            if in_string {
                if escape {
                    escape = false;
                } else if c == b'\\' {
                    escape = true;
                } else if c == b'"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                b'"' => in_string = true,
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[i..=i + j];
                        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                            return Some(value);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Build the thesis-generation prompt for round `round`.
#[must_use]
pub fn build_thesis_prompt(problem: &str, round: u32, previous_synthesis: Option<&str>) -> String {
    match previous_synthesis {
        Some(prev) => format!(
            "Problem: {problem}\n\
             This is round {round}. The previous round's synthesis was:\n{prev}\n\n\
             Propose a refined thesis — a position that builds on or improves that \
             synthesis. Respond with plain text."
        ),
        None => format!(
            "Problem: {problem}\n\n\
             Propose a thesis: an initial position or candidate answer. Respond with \
             plain text."
        ),
    }
}

/// Build the antithesis-generation prompt, challenging `thesis`.
#[must_use]
pub fn build_antithesis_prompt(problem: &str, thesis: &str) -> String {
    format!(
        "Problem: {problem}\n\
         Thesis: {thesis}\n\n\
         Propose an antithesis: a serious challenge, counterexample, or \
         alternative position that exposes the thesis's weaknesses. Respond with \
         plain text."
    )
}

/// Build the synthesis-generation prompt, reconciling `thesis` and `antithesis`.
#[must_use]
pub fn build_synthesis_prompt(problem: &str, thesis: &str, antithesis: &str) -> String {
    format!(
        "Problem: {problem}\n\
         Thesis: {thesis}\n\
         Antithesis: {antithesis}\n\n\
         Propose a synthesis that reconciles the strongest parts of both into a \
         single, improved answer. Respond with plain text."
    )
}

/// A structured verification of one claim (§3 "verification").
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedVerification {
    /// Whether the claim is judged valid.
    pub is_valid: bool,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Issues identified with the claim.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Strengths identified in the claim.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// A suggestion for improving the claim.
    #[serde(default)]
    pub suggestion: String,
}

/// Build the verification prompt for one claim, optionally splicing in
/// tool-gathered evidence (§4.11 "Verification").
#[must_use]
pub fn build_verification_prompt(problem: &str, claim_kind: &str, claim: &str, evidence: &str) -> String {
    let evidence_section = if evidence.is_empty() {
        String::new()
    } else {
        format!("\n\nTool-gathered evidence:\n{evidence}")
    };
    format!(
        "Problem: {problem}\n\
         Claim ({claim_kind}): {claim}{evidence_section}\n\n\
         Critically evaluate this claim. Respond with JSON: {{\"is_valid\": <bool>, \
         \"score\": <0..1>, \"issues\": [\"...\"], \"strengths\": [\"...\"], \
         \"suggestion\": \"...\"}}."
    )
}

/// Parse a verification response. Returns `None` on malformed JSON so the
/// caller can fall through to the lenient text heuristic (§4.11
/// "Verification" — "falls through to a lenient text-to-verification
/// heuristic rather than failing the round").
#[must_use]
pub fn parse_verification(raw: &str) -> Option<ParsedVerification> {
    extract_json(raw).and_then(|v| serde_json::from_value(v).ok())
}

/// Lenient text-to-verification heuristic: extract a `0..1` score if one
/// appears in the text, and infer validity from simple keyword cues.
/// Used only when [`parse_verification`] fails to find parsable JSON
/// (§4.11 "Verification").
#[must_use]
pub fn heuristic_verification(raw: &str) -> ParsedVerification {
    let lower = raw.to_lowercase();
    let score = extract_first_decimal_in_unit_interval(&lower).unwrap_or(0.5);
    let negative_cues = ["invalid", "incorrect", "flawed", "does not", "doesn't hold", "fails to"];
    let is_valid = !negative_cues.iter().any(|cue| lower.contains(cue));
    ParsedVerification {
        is_valid,
        score,
        issues: Vec::new(),
        strengths: Vec::new(),
        suggestion: String::new(),
    }
}

/// Find the first decimal-looking token in `[0, 1]` in free text, e.g.
/// "score of 0.82" or "confidence: 0.7".
fn extract_first_decimal_in_unit_interval(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    for i in 0..bytes.len() {
        if !bytes[i].is_ascii_digit() {
            continue;
        }
        let start = i;
        let mut end = i;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        if let Ok(value) = text[start..end].parse::<f64>() {
            if (0.0..=1.0).contains(&value) {
                return Some(value);
            }
        }
    }
    None
}

/// The parsed payload of a fast-mode single-call generation (§4.11 "Fast
/// mode").
#[derive(Debug, Clone, Deserialize)]
pub struct FastModePayload {
    /// The thesis.
    pub thesis: String,
    /// The antithesis.
    pub antithesis: String,
    /// The synthesis.
    pub synthesis: String,
    /// The model's self-reported confidence in the synthesis, `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
}

/// Build the fast-mode prompt: thesis/antithesis/synthesis/confidence in a
/// single call, with no separate verification (§4.11 "Fast mode").
#[must_use]
pub fn build_fast_mode_prompt(problem: &str) -> String {
    format!(
        "Problem: {problem}\n\n\
         Produce a thesis, an antithesis, and a synthesis in one pass, plus your \
         confidence in the synthesis. Respond with JSON: {{\"thesis\": \"...\", \
         \"antithesis\": \"...\", \"synthesis\": \"...\", \"confidence\": <0..1>}}."
    )
}

/// Parse a fast-mode response as JSON, falling back to a labeled-text
/// parser that recovers the three sections by their `Thesis:` /
/// `Antithesis:` / `Synthesis:` / `Confidence:` labels (§4.11 "Fast mode").
#[must_use]
pub fn parse_fast_mode(raw: &str) -> FastModePayload {
    if let Some(payload) = extract_json(raw).and_then(|v| serde_json::from_value::<FastModePayload>(v).ok()) {
        return payload;
    }
    parse_labeled_fast_mode(raw)
}

/// Recover thesis/antithesis/synthesis/confidence from labeled plain text,
/// case-insensitively, when the model didn't return JSON.
fn parse_labeled_fast_mode(raw: &str) -> FastModePayload {
    let labels = ["thesis", "antithesis", "synthesis", "confidence"];
    let lower = raw.to_lowercase();
    let mut spans: Vec<(usize, &str)> = Vec::new();
    for label in labels {
        let needle = format!("{label}:");
        if let Some(pos) = lower.find(&needle) {
            spans.push((pos, label));
        }
    }
    spans.sort_by_key(|(pos, _)| *pos);

    let mut sections: std::collections::HashMap<&str, String> = std::collections::HashMap::new();
    for (idx, (pos, label)) in spans.iter().enumerate() {
        let label_len = label.len() + 1; // "label:"
        let content_start = pos + label_len;
        let content_end = spans.get(idx + 1).map(|(p, _)| *p).unwrap_or(raw.len());
        if content_start <= raw.len() && content_end <= raw.len() && content_start <= content_end {
            sections.insert(label, raw[content_start..content_end].trim().to_string());
        }
    }

    let confidence = sections
        .get("confidence")
        .and_then(|s| extract_first_decimal_in_unit_interval(&s.to_lowercase()))
        .unwrap_or(0.5);

    FastModePayload {
        thesis: sections.get("thesis").cloned().unwrap_or_else(|| raw.trim().to_string()),
        antithesis: sections.get("antithesis").cloned().unwrap_or_default(),
        synthesis: sections.get("synthesis").cloned().unwrap_or_default(),
        confidence,
    }
}

/// A proposed tool call the model wants verification to gather evidence
/// with (§4.11 "Verification").
#[derive(Debug, Clone, Deserialize)]
pub struct ProposedToolCall {
    /// Tool name.
    pub name: String,
    /// Tool input.
    #[serde(default)]
    pub input: Value,
}

/// Build the prompt asking which tool calls (if any) would help verify a
/// claim.
#[must_use]
pub fn build_tool_proposal_prompt(claim: &str, tool_names: &[String]) -> String {
    format!(
        "Claim to verify: {claim}\n\
         Available tools: {}.\n\n\
         List up to 2 tool calls that would help verify this claim, as a JSON \
         array of {{\"name\": \"...\", \"input\": {{...}}}}. Respond with \"[]\" if \
         none would help.",
        tool_names.join(", ")
    )
}

/// Parse a tool-proposal response into a list of proposed calls, capped at
/// `max`. Malformed JSON yields no proposals.
#[must_use]
pub fn parse_tool_proposals(raw: &str, max: usize) -> Vec<ProposedToolCall> {
    let Some(Value::Array(items)) = extract_json(raw) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ProposedToolCall>(item).ok())
        .filter(|call| !call.name.is_empty())
        .take(max)
        .collect()
}
