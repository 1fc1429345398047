//! Provider catalog and fallback-chain construction for the RPC surface
//! (§6 `list_providers`, per-tool provider/model/fallback env overrides).

use std::sync::Arc;

use reason_provider::{DynProvider, FallbackChain};
use serde::{Deserialize, Serialize};

use crate::error::McpError;

/// Canonical provider names, in default-selection priority order (§6
/// "built-in default", not itself spelled out by name in the spec but
/// implied by "auto-selects" language elsewhere — first configured wins).
const DEFAULT_PRIORITY: &[&str] = &["anthropic", "openai", "ollama"];

/// Static metadata about one provider adapter, used both to build a real
/// provider instance and to answer `list_providers()` (§6).
struct ProviderMeta {
    name: &'static str,
    aliases: &'static [&'static str],
    env_key: Option<&'static str>,
    default_model: &'static str,
    base_url: &'static str,
    note: Option<&'static str>,
}

const CATALOG: &[ProviderMeta] = &[
    ProviderMeta {
        name: "anthropic",
        aliases: &["claude"],
        env_key: Some("ANTHROPIC_API_KEY"),
        default_model: "claude-sonnet-4-20250514",
        base_url: "https://api.anthropic.com",
        note: None,
    },
    ProviderMeta {
        name: "openai",
        aliases: &["gpt"],
        env_key: Some("OPENAI_API_KEY"),
        default_model: "gpt-4o-mini",
        base_url: "https://api.openai.com",
        note: None,
    },
    ProviderMeta {
        name: "ollama",
        aliases: &["local"],
        env_key: None,
        default_model: "llama3.2",
        base_url: "http://localhost:11434",
        note: Some("local; no API key required"),
    },
];

/// `list_providers()` result entry (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderListing {
    /// Canonical provider name.
    pub name: String,
    /// Alternate names accepted for `provider` / `fallback_providers`.
    pub aliases: Vec<String>,
    /// Environment variable holding the API key, when one is required.
    pub env_key: Option<String>,
    /// The model used when no override is given.
    pub default_model: String,
    /// Base URL the adapter talks to.
    pub base_url: String,
    /// Whether this provider is currently usable (key present, or none
    /// required).
    pub configured: bool,
    /// Freeform note, e.g. "local; no API key required".
    pub note: Option<String>,
}

/// List every known provider with its current configuration status (§6
/// `list_providers`).
#[must_use]
pub fn list_providers() -> Vec<ProviderListing> {
    CATALOG
        .iter()
        .map(|meta| ProviderListing {
            name: meta.name.to_string(),
            aliases: meta.aliases.iter().map(|s| (*s).to_string()).collect(),
            env_key: meta.env_key.map(str::to_string),
            default_model: meta.default_model.to_string(),
            base_url: base_url_for(meta).to_string(),
            configured: is_configured(meta),
            note: meta.note.map(str::to_string),
        })
        .collect()
}

fn find_meta(name: &str) -> Option<&'static ProviderMeta> {
    let lower = name.to_ascii_lowercase();
    CATALOG
        .iter()
        .find(|meta| meta.name == lower || meta.aliases.contains(&lower.as_str()))
}

fn is_configured(meta: &ProviderMeta) -> bool {
    match meta.env_key {
        Some(key) => std::env::var(key).is_ok_and(|v| !v.trim().is_empty()),
        None => true,
    }
}

fn base_url_for(meta: &ProviderMeta) -> String {
    let override_var = format!("{}_BASE_URL", meta.name.to_ascii_uppercase());
    std::env::var(&override_var).unwrap_or_else(|_| meta.base_url.to_string())
}

/// Build a single provider adapter by canonical name or alias.
///
/// # Errors
///
/// [`McpError::UnknownProvider`] if the name isn't recognized, or a
/// recognized provider is missing its required API key.
fn build_one(name: &str, model_override: Option<&str>) -> Result<Arc<dyn DynProvider>, McpError> {
    let meta = find_meta(name).ok_or_else(|| McpError::UnknownProvider(name.to_string()))?;
    if !is_configured(meta) {
        return Err(McpError::UnknownProvider(name.to_string()));
    }
    let model = model_override.unwrap_or(meta.default_model).to_string();
    let base_url = base_url_for(meta);

    let provider: Arc<dyn DynProvider> = match meta.name {
        "anthropic" => {
            let api_key = std::env::var(meta.env_key.unwrap()).unwrap_or_default();
            Arc::new(reason_provider_anthropic::Anthropic::new(api_key).model(model).base_url(base_url))
        }
        "openai" => {
            let api_key = std::env::var(meta.env_key.unwrap()).unwrap_or_default();
            Arc::new(reason_provider_openai::OpenAi::new(api_key).model(model).base_url(base_url))
        }
        "ollama" => Arc::new(reason_provider_ollama::Ollama::new().model(model).base_url(base_url)),
        other => return Err(McpError::UnknownProvider(other.to_string())),
    };
    Ok(provider)
}

fn env_csv(var: &str) -> Vec<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Resolve the ordered provider name list for one tool call, per §6's
/// precedence: explicit RPC params > `<TOOL>_PROVIDER`/`<TOOL>_FALLBACKS` >
/// `LLM_PROVIDER`/`LLM_FALLBACKS` > built-in default priority order,
/// filtered to configured providers.
fn resolve_names(tool_env_prefix: &str, provider: Option<&str>, fallback_providers: &[String]) -> Vec<String> {
    if let Some(p) = provider {
        let mut names = vec![p.to_string()];
        names.extend(fallback_providers.iter().cloned());
        return names;
    }

    let tool_provider_var = format!("{tool_env_prefix}_PROVIDER");
    let tool_fallbacks_var = format!("{tool_env_prefix}_FALLBACKS");
    if let Ok(p) = std::env::var(&tool_provider_var) {
        let mut names = vec![p];
        names.extend(env_csv(&tool_fallbacks_var));
        return names;
    }

    if let Ok(p) = std::env::var("LLM_PROVIDER") {
        let mut names = vec![p];
        names.extend(env_csv("LLM_FALLBACKS"));
        return names;
    }

    DEFAULT_PRIORITY.iter().map(|s| (*s).to_string()).collect()
}

/// Resolve the per-call model override, per §6's precedence: explicit RPC
/// param > `<TOOL>_MODEL` > `LLM_MODEL` > the chosen provider's own default.
fn resolve_model(tool_env_prefix: &str, model: Option<&str>) -> Option<String> {
    if let Some(m) = model {
        return Some(m.to_string());
    }
    let tool_model_var = format!("{tool_env_prefix}_MODEL");
    std::env::var(&tool_model_var).ok().or_else(|| std::env::var("LLM_MODEL").ok())
}

/// Build a [`FallbackChain`] for one tool call, applying §6's provider and
/// model resolution precedence and silently skipping any named provider
/// that can't be configured (logging a warning) rather than failing the
/// whole chain on one bad name.
///
/// # Errors
///
/// [`McpError::NoProviders`] if, after resolution and filtering, no
/// provider could be built at all.
pub fn build_chain(
    tool_env_prefix: &str,
    provider: Option<&str>,
    fallback_providers: &[String],
    model: Option<&str>,
) -> Result<Arc<FallbackChain>, McpError> {
    let names = resolve_names(tool_env_prefix, provider, fallback_providers);
    let resolved_model = resolve_model(tool_env_prefix, model);

    let mut seen = std::collections::HashSet::new();
    let mut built = Vec::new();
    for name in names {
        let key = name.to_ascii_lowercase();
        if !seen.insert(key) {
            continue;
        }
        match build_one(&name, resolved_model.as_deref()) {
            Ok(p) => built.push(p),
            Err(err) => tracing::warn!(provider = %name, error = %err, "skipping unconfigured provider in fallback chain"),
        }
    }

    if built.is_empty() {
        return Err(McpError::NoProviders);
    }
    FallbackChain::new(built).map(Arc::new).map_err(|e| McpError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_providers_includes_all_three_known_adapters() {
        let listing = list_providers();
        let names: Vec<&str> = listing.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["anthropic", "openai", "ollama"]);
    }

    #[test]
    fn ollama_is_always_configured_without_a_key() {
        let listing = list_providers();
        let ollama = listing.iter().find(|p| p.name == "ollama").unwrap();
        assert!(ollama.configured);
        assert!(ollama.env_key.is_none());
    }

    #[test]
    fn find_meta_resolves_by_alias() {
        assert!(find_meta("claude").is_some());
        assert!(find_meta("CLAUDE").is_some());
        assert!(find_meta("nonexistent-provider").is_none());
    }

    #[test]
    fn resolve_names_prefers_explicit_over_env_and_default() {
        let names = resolve_names("GOT", Some("openai"), &["ollama".to_string()]);
        assert_eq!(names, vec!["openai".to_string(), "ollama".to_string()]);
    }

    #[test]
    fn resolve_names_falls_back_to_default_priority() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::remove_var("LLM_PROVIDER");
            std::env::remove_var("GOT_PROVIDER");
        }
        let names = resolve_names("GOT", None, &[]);
        assert_eq!(names, vec!["anthropic".to_string(), "openai".to_string(), "ollama".to_string()]);
    }

    #[test]
    fn build_chain_falls_through_to_ollama_when_nothing_configured() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::remove_var("ANTHROPIC_API_KEY");
            std::env::remove_var("OPENAI_API_KEY");
            std::env::remove_var("LLM_PROVIDER");
            std::env::remove_var("GOT_PROVIDER");
        }
        let chain = build_chain("GOT", None, &[], None).unwrap();
        assert_eq!(chain.provider_names(), vec!["ollama"]);
    }

    #[test]
    fn build_chain_errors_when_nothing_can_be_configured() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::remove_var("LLM_PROVIDER");
            std::env::remove_var("X_PROVIDER");
        }
        let err = build_chain("X", Some("nonexistent-provider"), &[], None).unwrap_err();
        assert!(matches!(err, McpError::NoProviders));
    }
}
