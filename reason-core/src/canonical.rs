//! Canonicalization of JSON values for content-addressed keys (used by C13,
//! the result cache; §4.12, §8's canonical-cache law).
//!
//! `canonicalize` recursively sorts object keys so that two JSON values
//! differing only in key order hash identically, and strips a fixed set of
//! "notification-only" flags (`stream`, `notify`, `notification`) that
//! don't affect what a tool call actually does.

use serde_json::Value;

const STRIPPED_KEYS: &[&str] = &["stream", "notify", "notification"];

/// Recursively sort object keys and drop streaming/notification flags.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map
                .iter()
                .filter(|(k, _)| !STRIPPED_KEYS.contains(&k.as_str()))
                .collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` after canonicalization, for hashing or exact comparison.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}
