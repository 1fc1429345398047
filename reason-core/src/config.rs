//! Config store (C1) — process-wide typed settings with a lazy singleton
//! and an explicit reset hook for tests.
//!
//! Loading order: compiled defaults → environment overlay → clamp against
//! bounds (logging a warning per clamp) → publish an immutable snapshot
//! behind a reader/writer lock. `Config::reset` is test-only: it clears the
//! snapshot so the next `Config::get` re-reads the environment.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading configuration.
///
/// Loading never actually fails in this design — out-of-range values are
/// clamped and logged rather than rejected (§4.1) — but the type exists so
/// callers that *do* want strict validation (e.g. a `--strict-config` CLI
/// flag) have something to propagate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that couldn't be parsed at all
    /// (not merely out of range — out-of-range values are clamped, not
    /// rejected).
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// The environment variable name.
        var: String,
        /// The unparseable value.
        value: String,
    },
}

const MIN_DURATION: Duration = Duration::from_secs(1);
const MAX_DURATION: Duration = Duration::from_secs(3600);
const MAX_TOOL_DURATION: Duration = Duration::from_secs(300);
const MAX_CONCURRENCY: u32 = 20;
const MAX_TOKENS_CAP_CEILING: u32 = 200_000;

/// Per-provider request timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTimeouts {
    /// Named provider timeouts (provider name, lowercase, e.g. "anthropic").
    pub by_provider: HashMap<String, Duration>,
    /// Fallback used for a provider with no explicit entry.
    pub default: Duration,
}

impl ProviderTimeouts {
    /// Resolve the timeout for a provider by name, falling back to the default.
    #[must_use]
    pub fn get(&self, provider: &str) -> Duration {
        self.by_provider
            .get(&provider.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default)
    }
}

/// Per-tool-kind execution timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTimeouts {
    /// Named tool timeouts (tool name, e.g. "code_executor").
    pub by_tool: HashMap<String, Duration>,
    /// Fallback used for a tool with no explicit entry.
    pub default: Duration,
}

impl ToolTimeouts {
    /// Resolve the timeout for a tool by name, falling back to the default.
    #[must_use]
    pub fn get(&self, tool: &str) -> Duration {
        self.by_tool.get(tool).copied().unwrap_or(self.default)
    }
}

/// Immutable-after-init process configuration.
///
/// Invariants enforced at load time (§3):
///   - every duration lies in `[1s, 1h]`; tool durations additionally `<= 5min`
///   - `max_concurrent_model_calls` in `[0, 20]`, 0 meaning "unlimited"
///   - `max_tokens_cap` in `[1, 200_000]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Per-provider chat timeouts.
    pub provider_timeouts: ProviderTimeouts,
    /// Per-tool-kind execution timeouts.
    pub tool_timeouts: ToolTimeouts,
    /// Upper bound on `ChatOptions::max_tokens`; 0 would be meaningless so
    /// this field itself cannot be 0 (clamped to at least 1).
    pub max_tokens_cap: u32,
    /// Maximum number of concurrent outbound model calls. 0 = unlimited
    /// (the FIFO limiter is bypassed entirely, §4.2 invariant iv).
    pub max_concurrent_model_calls: u32,
    /// Result-cache TTL; `None` disables the cache entirely (C13).
    pub tool_cache_ttl: Option<Duration>,
    /// Result-cache maximum entry count.
    pub tool_cache_max: usize,
    /// Explicit opt-in for the code-execution tool (§4.7).
    pub code_exec_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_timeouts: ProviderTimeouts {
                by_provider: HashMap::new(),
                default: Duration::from_secs(30),
            },
            tool_timeouts: ToolTimeouts {
                by_tool: HashMap::new(),
                default: Duration::from_secs(30),
            },
            max_tokens_cap: 8192,
            max_concurrent_model_calls: 4,
            tool_cache_ttl: None,
            tool_cache_max: 256,
            code_exec_enabled: false,
        }
    }
}

fn clamp_duration(name: &str, value: Duration, max: Duration) -> Duration {
    if value < MIN_DURATION {
        tracing::warn!(setting = name, value = ?value, min = ?MIN_DURATION, "duration below minimum, clamping");
        MIN_DURATION
    } else if value > max {
        tracing::warn!(setting = name, value = ?value, max = ?max, "duration above maximum, clamping");
        max
    } else {
        value
    }
}

fn env_duration_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|s| s.parse::<u32>().ok())
}

// Providers whose timeouts are individually configurable via
// `<PROVIDER>_TIMEOUT_SECS` (names mirror the providers, §6).
const KNOWN_PROVIDERS: &[&str] = &["anthropic", "openai", "ollama"];

// Tool kinds whose timeouts are individually configurable via
// `<TOOL>_TIMEOUT_SECS`.
const KNOWN_TOOLS: &[&str] = &["calculator", "code_executor", "http_fetch", "string_ops"];

impl Config {
    fn load() -> Self {
        let mut cfg = Self::default();

        if let Some(d) = env_duration_secs("LLM_TIMEOUT_SECS") {
            cfg.provider_timeouts.default = d;
        }
        for provider in KNOWN_PROVIDERS {
            let var = format!("{}_TIMEOUT_SECS", provider.to_ascii_uppercase());
            if let Some(d) = env_duration_secs(&var) {
                cfg.provider_timeouts
                    .by_provider
                    .insert((*provider).to_string(), d);
            }
        }

        if let Some(d) = env_duration_secs("TOOL_TIMEOUT_SECS") {
            cfg.tool_timeouts.default = d;
        }
        for tool in KNOWN_TOOLS {
            let var = format!("{}_TIMEOUT_SECS", tool.to_ascii_uppercase());
            if let Some(d) = env_duration_secs(&var) {
                cfg.tool_timeouts.by_tool.insert((*tool).to_string(), d);
            }
        }

        if let Some(v) = env_u32("LLM_MAX_TOKENS_CAP") {
            cfg.max_tokens_cap = v;
        }
        if let Some(v) = env_u32("LLM_MAX_CONCURRENT") {
            cfg.max_concurrent_model_calls = v;
        }
        if let Some(d) = env_duration_secs("TOOL_CACHE_TTL") {
            cfg.tool_cache_ttl = if d.is_zero() { None } else { Some(d) };
        }
        if let Some(v) = env_u32("TOOL_CACHE_MAX") {
            cfg.tool_cache_max = v as usize;
        }
        if let Ok(v) = std::env::var("CODE_EXEC_ENABLED") {
            cfg.code_exec_enabled = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
        }

        cfg.provider_timeouts.default =
            clamp_duration("provider default timeout", cfg.provider_timeouts.default, MAX_DURATION);
        for (name, d) in cfg.provider_timeouts.by_provider.iter_mut() {
            *d = clamp_duration(&format!("{name} timeout"), *d, MAX_DURATION);
        }
        cfg.tool_timeouts.default =
            clamp_duration("tool default timeout", cfg.tool_timeouts.default, MAX_TOOL_DURATION);
        for (name, d) in cfg.tool_timeouts.by_tool.iter_mut() {
            *d = clamp_duration(&format!("{name} timeout"), *d, MAX_TOOL_DURATION);
        }

        if cfg.max_concurrent_model_calls > MAX_CONCURRENCY {
            tracing::warn!(
                value = cfg.max_concurrent_model_calls,
                max = MAX_CONCURRENCY,
                "max_concurrent_model_calls above maximum, clamping"
            );
            cfg.max_concurrent_model_calls = MAX_CONCURRENCY;
        }

        if cfg.max_tokens_cap == 0 {
            tracing::warn!("max_tokens_cap was 0, clamping to 1");
            cfg.max_tokens_cap = 1;
        } else if cfg.max_tokens_cap > MAX_TOKENS_CAP_CEILING {
            tracing::warn!(
                value = cfg.max_tokens_cap,
                max = MAX_TOKENS_CAP_CEILING,
                "max_tokens_cap above maximum, clamping"
            );
            cfg.max_tokens_cap = MAX_TOKENS_CAP_CEILING;
        }

        cfg
    }
}

static SNAPSHOT: RwLock<Option<&'static Config>> = RwLock::new(None);
static INIT: OnceLock<()> = OnceLock::new();

impl Config {
    /// Return the process-wide config snapshot, loading it on first call.
    ///
    /// Subsequent readers take the read path without blocking writers —
    /// in practice writers only run inside `reset`, which test code calls
    /// between runs.
    #[must_use]
    pub fn get() -> &'static Config {
        {
            let guard = SNAPSHOT.read().expect("config lock poisoned");
            if let Some(cfg) = *guard {
                return cfg;
            }
        }
        let mut guard = SNAPSHOT.write().expect("config lock poisoned");
        if let Some(cfg) = *guard {
            return cfg;
        }
        let cfg: &'static Config = Box::leak(Box::new(Config::load()));
        *guard = Some(cfg);
        INIT.get_or_init(|| ());
        cfg
    }

    /// Test-only reset: clears the snapshot (so the next `get` re-reads the
    /// environment) and tears down the FIFO limiter singleton.
    ///
    /// Leaks the previous snapshot (it's a `&'static`, `Box::leak`'d at
    /// load time) — acceptable because this is only ever called from test
    /// suites that run a bounded number of times.
    pub fn reset() {
        let mut guard = SNAPSHOT.write().expect("config lock poisoned");
        *guard = None;
        reason_limiter_reset_hook();
    }
}

/// Indirection so `reason-core` doesn't depend on `reason-limiter` just to
/// tear it down. `reason-limiter` registers its reset function here once,
/// at process start, via `register_limiter_reset`.
static LIMITER_RESET: RwLock<Option<fn()>> = RwLock::new(None);

/// Called by `reason-limiter` to hook itself into `Config::reset`.
pub fn register_limiter_reset(f: fn()) {
    *LIMITER_RESET.write().expect("limiter reset lock poisoned") = Some(f);
}

fn reason_limiter_reset_hook() {
    if let Some(f) = *LIMITER_RESET.read().expect("limiter reset lock poisoned") {
        f();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_in_bounds() {
        let cfg = Config::default();
        assert!(cfg.provider_timeouts.default >= MIN_DURATION);
        assert!(cfg.provider_timeouts.default <= MAX_DURATION);
        assert!(cfg.max_concurrent_model_calls <= MAX_CONCURRENCY);
        assert!(cfg.max_tokens_cap >= 1 && cfg.max_tokens_cap <= MAX_TOKENS_CAP_CEILING);
    }

    #[test]
    fn clamp_duration_clamps_low() {
        let d = clamp_duration("x", Duration::from_millis(10), MAX_DURATION);
        assert_eq!(d, MIN_DURATION);
    }

    #[test]
    fn clamp_duration_clamps_high() {
        let d = clamp_duration("x", Duration::from_secs(999_999), MAX_DURATION);
        assert_eq!(d, MAX_DURATION);
    }

    #[test]
    fn clamp_duration_passes_through_in_range() {
        let d = clamp_duration("x", Duration::from_secs(10), MAX_DURATION);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn provider_timeouts_fall_back_to_default() {
        let pt = ProviderTimeouts {
            by_provider: HashMap::new(),
            default: Duration::from_secs(7),
        };
        assert_eq!(pt.get("anything"), Duration::from_secs(7));
    }

    #[test]
    fn tool_cache_ttl_zero_means_disabled() {
        // Zero seconds collapses to None per loading logic; verify the
        // mapping function used during `load` does this.
        let raw = Duration::from_secs(0);
        let resolved = if raw.is_zero() { None } else { Some(raw) };
        assert_eq!(resolved, None);
    }
}
