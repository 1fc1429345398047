//! Tool registry construction and `enabled_tools` validation at the RPC
//! boundary (§4.7, §6).

use std::sync::Arc;

use reason_cache::ResultCache;
use reason_tools::ToolRegistry;

/// Build a registry of the built-in tools (C8), wired to the process-wide
/// result cache (C13).
#[must_use]
pub fn build_registry() -> Arc<ToolRegistry> {
    let registry = ToolRegistry::with_builtins().with_cache(Arc::new(ResultCache::from_config()));
    Arc::new(registry)
}

/// Validate a caller-supplied `enabled_tools` list against the registry's
/// known names, splitting it into the valid subset and the invalid
/// entries. Callers log a single warning naming every invalid entry and
/// the available set, then proceed with the valid subset (§6).
#[must_use]
pub fn resolve_enabled_tools(registry: &ToolRegistry, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        return registry.names();
    }

    let known = registry.names();
    let (valid, invalid): (Vec<String>, Vec<String>) =
        requested.iter().cloned().partition(|name| known.contains(name));

    if !invalid.is_empty() {
        tracing::warn!(
            invalid = ?invalid,
            available = ?known,
            "ignoring unknown tool names in enabled_tools"
        );
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_means_every_registered_tool() {
        let registry = ToolRegistry::with_builtins();
        let resolved = resolve_enabled_tools(&registry, &[]);
        assert_eq!(resolved, registry.names());
    }

    #[test]
    fn invalid_names_are_filtered_without_rejecting_the_whole_call() {
        let registry = ToolRegistry::with_builtins();
        let requested = vec!["calculator".to_string(), "not_a_real_tool".to_string()];
        let resolved = resolve_enabled_tools(&registry, &requested);
        assert_eq!(resolved, vec!["calculator".to_string()]);
    }

    #[test]
    fn all_valid_names_pass_through_unchanged() {
        let registry = ToolRegistry::with_builtins();
        let requested = vec!["calculator".to_string(), "string_ops".to_string()];
        let resolved = resolve_enabled_tools(&registry, &requested);
        assert_eq!(resolved, requested);
    }
}
