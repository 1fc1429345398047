//! Prompt construction and response parsing for each model call a
//! [`crate::engine::ReflexionEngine`] run makes (§4.10).

use serde::Deserialize;
use serde_json::Value;

/// Extract the first balanced top-level JSON value (object or array) from
/// free-form model text, tolerating prose/code fences around it. Mirrors
/// the same lenient extraction the graph-of-thoughts engine uses, since
/// reflexion attempts are just as likely to come back wrapped in prose.
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

/// One step the model produced inside an attempt's inner reasoning loop
/// (§4.10 step 3a): either a thought (optionally final, carrying the
/// answer) or a tool action whose output is fed back into the next
/// iteration's prompt.
#[derive(Debug, Clone)]
pub enum AttemptStep {
    /// Continue reasoning with a new thought, or conclude the attempt.
    Thought {
        /// The thought text.
        thought: String,
        /// Whether this thought concludes the attempt.
        is_final: bool,
        /// The final answer, present when `is_final`.
        answer: Option<String>,
    },
    /// Invoke a named tool before continuing to reason.
    Tool {
        /// Tool name as registered in the [`reason_tools::ToolRegistry`].
        name: String,
        /// Input to pass to the tool.
        input: Value,
    },
}

/// Build the prompt for one inner-loop iteration of an attempt, folding in
/// lessons from past runs (fetched once at run start, §4.8), this run's own
/// prior reflections, the thoughts and tool results accumulated so far in
/// *this* attempt, and (if tools are enabled) the tool catalog.
#[must_use]
pub fn build_step_prompt(
    problem: &str,
    lessons: &[String],
    prior_reflections: &[String],
    trail: &[String],
    step: u32,
    max_thoughts: u32,
    tool_names: &[String],
) -> String {
    let mut sections = vec![format!("Problem: {problem}")];
    if !lessons.is_empty() {
        sections.push(format!(
            "Lessons from past attempts at similar problems:\n{}",
            lessons.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n")
        ));
    }
    if !prior_reflections.is_empty() {
        sections.push(format!(
            "Your own reflections on earlier failed attempts this run:\n{}",
            prior_reflections
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{}. {r}", i + 1))
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }
    if !trail.is_empty() {
        sections.push(format!(
            "So far this attempt:\n{}",
            trail.iter().enumerate().map(|(i, t)| format!("{}. {t}", i + 1)).collect::<Vec<_>>().join("\n")
        ));
    }
    let tools_section = if tool_names.is_empty() {
        "No tools are available; respond with a thought step only.".to_string()
    } else {
        format!(
            "Available tools: {}. To use one, respond with {{\"type\": \"tool\", \"name\": \"...\", \"input\": {{...}}}}.",
            tool_names.join(", ")
        )
    };
    sections.push(format!(
        "This is step {step} of at most {max_thoughts}. {tools_section}\n\n\
         Otherwise respond with a thought step: {{\"type\": \"thought\", \"thought\": \"...\", \
         \"is_final\": bool, \"answer\": \"...\" or null}}. Set is_final=true and give a \
         complete answer once you're confident, otherwise keep is_final=false and leave \
         answer null."
    ));
    sections.join("\n\n")
}

/// Parse one inner-loop step response. An object tagged `"type": "tool"` (or
/// carrying `name`/`input` without a recognized `thought` field) is read as
/// a tool action; anything else is read as a thought step. Malformed JSON
/// degrades to a non-final thought wrapping the raw text verbatim, so an
/// attempt never stalls on unparsable model output.
#[must_use]
pub fn parse_step(raw: &str) -> AttemptStep {
    let fallback = || AttemptStep::Thought {
        thought: raw.trim().to_string(),
        is_final: false,
        answer: None,
    };
    let Some(Value::Object(obj)) = extract_json(raw) else {
        return fallback();
    };
    let kind = obj.get("type").and_then(Value::as_str);
    let looks_like_tool = kind == Some("tool") || (kind.is_none() && obj.contains_key("name") && obj.contains_key("input"));
    if looks_like_tool {
        let name = obj.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        if name.is_empty() {
            return fallback();
        }
        let input = obj.get("input").cloned().unwrap_or(Value::Null);
        return AttemptStep::Tool { name, input };
    }
    let Some(thought) = obj.get("thought").and_then(Value::as_str) else {
        return fallback();
    };
    AttemptStep::Thought {
        thought: thought.to_string(),
        is_final: obj.get("is_final").and_then(Value::as_bool).unwrap_or(false),
        answer: obj.get("answer").and_then(Value::as_str).map(str::to_string),
    }
}

/// Build the "please produce your final answer now" prompt issued when the
/// inner loop exhausts `max_thoughts_per_attempt` without a final step
/// (§4.10 step 3b).
#[must_use]
pub fn build_force_final_prompt(problem: &str, trail: &[String]) -> String {
    let rendered = if trail.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nSo far:\n{}",
            trail.iter().enumerate().map(|(i, t)| format!("{}. {t}", i + 1)).collect::<Vec<_>>().join("\n")
        )
    };
    format!("Problem: {problem}{rendered}\n\nYou're out of further reasoning steps. Give your final answer now, in plain text.")
}

/// An evaluator's judgment of one attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct Judgment {
    /// Whether the attempt actually solves the problem.
    pub success: bool,
    /// Score in `[0, 1]`, used to pick the best attempt on exhaustion.
    #[serde(default)]
    pub score: f64,
    /// Why the attempt failed, when `success` is false.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Build the evaluator prompt judging one attempt's answer.
#[must_use]
pub fn build_evaluation_prompt(problem: &str, answer: &str) -> String {
    format!(
        "Problem: {problem}\n\
         Proposed answer: {answer}\n\n\
         Does this answer correctly and completely solve the problem? Respond with \
         JSON: {{\"success\": <bool>, \"score\": <0..1>, \"failure_reason\": <string or null>}}."
    )
}

/// Parse an evaluator response. Falls back to `success=false` with a
/// mid-range score on malformed JSON, rather than crashing the run or
/// silently declaring victory.
#[must_use]
pub fn parse_evaluation(raw: &str) -> Judgment {
    extract_json(raw).and_then(|v| serde_json::from_value(v).ok()).unwrap_or(Judgment {
        success: false,
        score: 0.3,
        failure_reason: Some("evaluator response was not parseable".to_string()),
    })
}

/// Build the reflection prompt: free-text self-critique of a failed
/// attempt, used to inform the next attempt (§4.10 step 4).
#[must_use]
pub fn build_reflection_prompt(problem: &str, answer: &str, failure_reason: Option<&str>) -> String {
    let reason = failure_reason.unwrap_or("it did not solve the problem");
    format!(
        "Problem: {problem}\n\
         Your attempted answer: {answer}\n\
         Why it fell short: {reason}\n\n\
         Reflect in a few sentences on what went wrong and what you should try \
         differently next time. Respond with plain text, not JSON."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_step_reads_a_non_final_thought() {
        let step = parse_step(r#"{"type": "thought", "thought": "first idea", "is_final": false}"#);
        match step {
            AttemptStep::Thought { thought, is_final, answer } => {
                assert_eq!(thought, "first idea");
                assert!(!is_final);
                assert!(answer.is_none());
            }
            AttemptStep::Tool { .. } => panic!("expected a thought step"),
        }
    }

    #[test]
    fn parse_step_reads_a_final_thought_with_answer() {
        let step = parse_step(r#"{"thought": "got it", "is_final": true, "answer": "42"}"#);
        match step {
            AttemptStep::Thought { is_final, answer, .. } => {
                assert!(is_final);
                assert_eq!(answer.as_deref(), Some("42"));
            }
            AttemptStep::Tool { .. } => panic!("expected a thought step"),
        }
    }

    #[test]
    fn parse_step_reads_a_tool_action() {
        let step = parse_step(r#"{"type": "tool", "name": "calculator", "input": {"expression": "2+2"}}"#);
        match step {
            AttemptStep::Tool { name, input } => {
                assert_eq!(name, "calculator");
                assert_eq!(input["expression"], "2+2");
            }
            AttemptStep::Thought { .. } => panic!("expected a tool step"),
        }
    }

    #[test]
    fn parse_step_falls_back_to_raw_text_on_malformed_json() {
        let step = parse_step("the answer is 42");
        match step {
            AttemptStep::Thought { thought, is_final, .. } => {
                assert_eq!(thought, "the answer is 42");
                assert!(!is_final);
            }
            AttemptStep::Tool { .. } => panic!("expected a thought fallback"),
        }
    }

    #[test]
    fn parse_evaluation_reads_success_and_score() {
        let judgment = parse_evaluation(r#"{"success": true, "score": 0.95}"#);
        assert!(judgment.success);
        assert!((judgment.score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn parse_evaluation_defaults_to_failure_on_malformed_json() {
        let judgment = parse_evaluation("garbage");
        assert!(!judgment.success);
        assert!(judgment.failure_reason.is_some());
    }

    #[test]
    fn build_step_prompt_includes_lessons_reflections_and_trail_when_present() {
        let prompt = build_step_prompt(
            "p",
            &["lesson one".into()],
            &["reflection one".into()],
            &["earlier thought".into()],
            2,
            5,
            &[],
        );
        assert!(prompt.contains("lesson one"));
        assert!(prompt.contains("reflection one"));
        assert!(prompt.contains("earlier thought"));
    }

    #[test]
    fn build_step_prompt_omits_empty_sections() {
        let prompt = build_step_prompt("p", &[], &[], &[], 1, 5, &[]);
        assert!(!prompt.contains("Lessons from past attempts"));
        assert!(!prompt.contains("Your own reflections"));
        assert!(!prompt.contains("So far this attempt"));
    }

    #[test]
    fn build_step_prompt_lists_available_tools() {
        let prompt = build_step_prompt("p", &[], &[], &[], 1, 5, &["calculator".to_string()]);
        assert!(prompt.contains("calculator"));
    }
}
