//! Prompt construction and response parsing for each model call a
//! [`crate::engine::GotEngine`] run makes (§4.9).

use serde::Deserialize;
use serde_json::Value;

/// One candidate action the model proposed for a node's expansion.
#[derive(Debug, Clone)]
pub enum Action {
    /// Continue reasoning with a new thought.
    Thought(String),
    /// Invoke a named tool.
    Tool {
        /// Tool name as registered in the [`reason_tools::ToolRegistry`].
        name: String,
        /// Input to pass to the tool.
        input: Value,
    },
}

/// Extract the first balanced top-level JSON value (object or array) from
/// free-form model text, tolerating prose/code fences around it.
fn extract_json(text: &str) -> Option<Value> {
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

/// Build the action-generation prompt for expanding `node_content` at
/// `depth` towards solving `problem`.
#[must_use]
pub fn build_action_prompt(
    problem: &str,
    node_content: &str,
    depth: u32,
    branching_factor: u32,
    tool_names: &[String],
) -> String {
    let tools_section = if tool_names.is_empty() {
        "No tools are available; respond with thoughts only.".to_string()
    } else {
        format!(
            "Available tools: {}. To use one, emit an action with \"type\": \"tool\".",
            tool_names.join(", ")
        )
    };
    format!(
        "Problem: {problem}\n\
         Current reasoning (depth {depth}): {node_content}\n\n\
         Propose up to {branching_factor} distinct next steps. {tools_section}\n\n\
         Respond with a JSON array. Each element is either a string (a thought) or an \
         object {{\"type\": \"thought\", \"content\": \"...\"}} or \
         {{\"type\": \"tool\", \"name\": \"...\", \"input\": {{...}}}}."
    )
}

/// Parse a model's action-generation response: a JSON array of either plain
/// strings (all treated as thoughts) or typed action objects. Malformed or
/// absent JSON degrades to a single thought action wrapping the raw text
/// verbatim, so a run never stalls on an unparsable response (§8 "a run
/// never panics on malformed model output").
#[must_use]
pub fn parse_actions(raw: &str) -> Vec<Action> {
    let Some(value) = extract_json(raw) else {
        return vec![Action::Thought(raw.trim().to_string())];
    };
    let Value::Array(items) = value else {
        return vec![Action::Thought(raw.trim().to_string())];
    };
    let mut actions = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => actions.push(Action::Thought(s)),
            Value::Object(ref obj) => {
                let kind = obj.get("type").and_then(Value::as_str).unwrap_or("thought");
                if kind == "tool" {
                    let name = obj.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    let input = obj.get("input").cloned().unwrap_or(Value::Null);
                    if name.is_empty() {
                        continue;
                    }
                    actions.push(Action::Tool { name, input });
                } else {
                    let content = obj.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
                    if !content.is_empty() {
                        actions.push(Action::Thought(content));
                    }
                }
            }
            _ => {}
        }
    }
    if actions.is_empty() {
        actions.push(Action::Thought(raw.trim().to_string()));
    }
    actions
}

/// An evaluator's scoring of a single thought (§4.9 step 2d).
#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Whether this thought is itself a solution to the problem.
    #[serde(default)]
    pub is_solution: bool,
    /// The final-answer text, present when `is_solution`.
    #[serde(default)]
    pub answer: Option<String>,
}

/// Build the evaluator prompt for a single thought.
#[must_use]
pub fn build_evaluation_prompt(problem: &str, thought: &str) -> String {
    format!(
        "Problem: {problem}\n\
         Candidate reasoning step: {thought}\n\n\
         Score how promising this step is towards solving the problem, from 0.0 \
         (dead end) to 1.0 (fully solves it). If it fully solves the problem, set \
         \"is_solution\": true and include the final answer.\n\n\
         Respond with JSON: {{\"score\": <0..1>, \"is_solution\": <bool>, \"answer\": <string or null>}}."
    )
}

/// Parse an evaluator response. Falls back to a neutral mid-range score
/// with `is_solution=false` on malformed JSON, rather than failing the run.
#[must_use]
pub fn parse_evaluation(raw: &str) -> Evaluation {
    extract_json(raw)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(Evaluation {
            score: 0.5,
            is_solution: false,
            answer: None,
        })
}

/// Build the low-temperature merge-probe prompt deciding whether two
/// thoughts at the same depth represent the same underlying idea (§4.9 step
/// 2c, §9 "merge decision delegated to a model probe").
#[must_use]
pub fn build_merge_probe_prompt(existing: &str, candidate: &str) -> String {
    format!(
        "Thought A: {existing}\n\
         Thought B: {candidate}\n\n\
         Do A and B represent substantially the same idea or approach (even if \
         worded differently)? Answer with exactly one word: yes or no."
    )
}

/// Parse a merge-probe response leniently: the answer is "yes" iff the
/// trimmed, lowercased response starts with "yes".
#[must_use]
pub fn parse_merge_probe(raw: &str) -> bool {
    raw.trim().to_lowercase().starts_with("yes")
}

/// Build the final-answer summarization prompt used when the expansion
/// loop exhausts (`max_nodes` reached or no expandable nodes remain)
/// without an early, high-confidence solution (§4.9 step 5).
#[must_use]
pub fn build_final_answer_prompt(problem: &str, path_contents: &[String]) -> String {
    let trail = path_contents
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Problem: {problem}\n\n\
         Reasoning trail:\n{trail}\n\n\
         Based on this reasoning, give the final answer to the problem in plain text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_actions_handles_plain_string_array() {
        let actions = parse_actions(r#"["try x", "try y"]"#);
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::Thought(s) if s == "try x"));
    }

    #[test]
    fn parse_actions_handles_typed_objects_and_tool_calls() {
        let raw = r#"Here is my plan: [
            {"type": "thought", "content": "reason about it"},
            {"type": "tool", "name": "calculator", "input": {"expression": "2+2"}}
        ]"#;
        let actions = parse_actions(raw);
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::Thought(s) if s == "reason about it"));
        assert!(matches!(&actions[1], Action::Tool { name, .. } if name == "calculator"));
    }

    #[test]
    fn parse_actions_falls_back_to_raw_text_on_malformed_json() {
        let actions = parse_actions("not json at all");
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::Thought(s) if s == "not json at all"));
    }

    #[test]
    fn parse_evaluation_reads_score_and_solution_flag() {
        let eval = parse_evaluation(r#"{"score": 0.9, "is_solution": true, "answer": "42"}"#);
        assert!((eval.score - 0.9).abs() < 1e-9);
        assert!(eval.is_solution);
        assert_eq!(eval.answer.as_deref(), Some("42"));
    }

    #[test]
    fn parse_evaluation_defaults_on_malformed_json() {
        let eval = parse_evaluation("garbage");
        assert!((eval.score - 0.5).abs() < 1e-9);
        assert!(!eval.is_solution);
    }

    #[test]
    fn parse_merge_probe_is_case_and_whitespace_lenient() {
        assert!(parse_merge_probe("  Yes, they match.\n"));
        assert!(!parse_merge_probe("no, different approaches"));
    }

    #[test]
    fn extract_json_skips_leading_prose() {
        let value = extract_json(r#"Sure, here it is: {"score": 0.2} done"#).unwrap();
        assert_eq!(value["score"], 0.2);
    }
}
