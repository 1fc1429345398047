//! Tool registry (C8), grounded on the teacher's `neuron_tool::ToolRegistry`
//! shape, extended with the enable/disable and default-deny policy §4.7
//! calls for.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use reason_cache::ResultCache;
use reason_core::Config;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::executor::{ToolContext, ToolExecutor};
use crate::result::ToolResult;

/// Name reserved for the code-execution tool, the one tool disabled by
/// default and gated behind the `CODE_EXEC_ENABLED` opt-in (§4.7).
pub const CODE_EXECUTOR_NAME: &str = "code_executor";

/// Placeholder used as the "provider" component of a tool-result cache key
/// (§4.12). A tool's result depends only on its own inputs, never on which
/// model provider is driving the enclosing engine run, so threading the
/// active `FallbackChain`'s leading provider name through three engine
/// crates just to vary this key would buy nothing — every cache entry for
/// a given `(tool, args)` pair is shared across providers by design (see
/// DESIGN.md's Open Question resolution for C13).
const CACHE_PROVIDER_SLOT: &str = "tool";

/// Registry of tools available to an engine run.
///
/// Holds tools as `Arc<dyn ToolExecutor>` keyed by name, alongside an
/// enabled/disabled flag per name. Every tool is enabled by default except
/// [`CODE_EXECUTOR_NAME`], which stays disabled until both `set_enabled`
/// names it *and* the process has the `CODE_EXEC_ENABLED` opt-in set.
///
/// Optionally wraps a [`ResultCache`] (C13): when present, `execute`
/// consults it by the canonical `(tool_name, args)` key before running the
/// tool, and stores successful results after running it.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
    enabled: RwLock<HashMap<String, bool>>,
    cache: Option<Arc<ResultCache>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            enabled: RwLock::new(HashMap::new()),
            cache: None,
        }
    }

    /// Attach a result cache (C13). Subsequent [`Self::execute`] calls
    /// consult and populate it.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Create a registry pre-populated with the four built-in tools
    /// (`calculator`, `code_executor`, `http_fetch`, `string_ops`). The
    /// code executor is registered but disabled, per the default-enable
    /// policy.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::builtin::Calculator));
        registry.register(Arc::new(crate::builtin::CodeExecutor));
        registry.register(Arc::new(crate::builtin::HttpFetch::new()));
        registry.register(Arc::new(crate::builtin::StringOps));
        registry
    }

    /// Register a tool, enabled by default unless it is the code executor.
    /// Overwrites any existing registration under the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolExecutor>) {
        let name = tool.name().to_string();
        let default_enabled = name != CODE_EXECUTOR_NAME;
        self.tools.insert(name.clone(), tool);
        self.enabled
            .write()
            .expect("enabled lock poisoned")
            .insert(name, default_enabled);
    }

    /// Replace the enabled set: every registered tool named in `names` is
    /// enabled, every other registered tool is disabled. An attempt to
    /// enable [`CODE_EXECUTOR_NAME`] without the `CODE_EXEC_ENABLED`
    /// environment opt-in is silently dropped — the tool stays disabled
    /// and no error is raised (§4.7).
    pub fn set_enabled(&self, names: &[String]) {
        let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
        let code_exec_opt_in = Config::get().code_exec_enabled;
        let mut guard = self.enabled.write().expect("enabled lock poisoned");
        for name in self.tools.keys() {
            let mut want = requested.contains(name.as_str());
            if want && name == CODE_EXECUTOR_NAME && !code_exec_opt_in {
                tracing::warn!(
                    tool = name,
                    "code executor requested without CODE_EXEC_ENABLED opt-in, ignoring"
                );
                want = false;
            }
            guard.insert(name.clone(), want);
        }
    }

    /// Names of every registered tool, regardless of enabled state — used
    /// for `enabled_tools` validation at the RPC boundary (§4.7, §6).
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a name is a registered tool (enabled or not).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name under the given cancellation token.
    ///
    /// Unknown or disabled tools return a structured `ToolResult` with
    /// `success=false`; they never return an `Err` or panic. `success=true`
    /// only when the executor itself returned `Ok` (§4.7). A cache hit
    /// (when a [`ResultCache`] is attached) short-circuits execution
    /// entirely, still returning `success=true`.
    pub async fn execute(
        &self,
        cancel: CancellationToken,
        name: &str,
        input: serde_json::Value,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(name, input, ToolError::NotFound(name.to_string()).to_string());
        };

        let enabled = *self
            .enabled
            .read()
            .expect("enabled lock poisoned")
            .get(name)
            .unwrap_or(&false);
        if !enabled {
            return ToolResult::err(name, input, ToolError::Disabled(name.to_string()).to_string());
        }

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| reason_cache::cache_key(name, CACHE_PROVIDER_SLOT, &input));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                return ToolResult::ok(name, input, hit);
            }
        }

        let timeout = Config::get().tool_timeouts.get(name);
        let ctx = ToolContext::new(cancel.clone(), timeout);
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(ToolError::Cancelled),
            res = tokio::time::timeout(timeout, tool.execute(&ctx, input.clone())) => match res {
                Ok(inner) => inner,
                Err(_elapsed) => Err(ToolError::Timeout(timeout)),
            },
        };

        match outcome {
            Ok(output) => {
                if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                    cache.put(key.clone(), output.clone());
                }
                ToolResult::ok(name, input, output)
            }
            Err(e) => ToolResult::err(name, input, e.to_string()),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolContext;
    use std::future::Future;
    use std::pin::Pin;

    struct EchoTool;

    impl ToolExecutor for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn execute(
            &self,
            _ctx: &ToolContext,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
            Box::pin(async move { Ok(input.to_string()) })
        }
    }

    struct SlowTool;

    impl ToolExecutor for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never finishes"
        }
        fn execute(
            &self,
            _ctx: &ToolContext,
            _input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
            Box::pin(async move {
                std::future::pending::<()>().await;
                unreachable!()
            })
        }
    }

    #[test]
    fn register_enables_everything_except_code_executor() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert_eq!(
            *reg.enabled.read().unwrap().get("echo").unwrap(),
            true
        );
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_failed_result_not_panic() {
        let reg = ToolRegistry::new();
        let result = reg
            .execute(CancellationToken::new(), "nonexistent", serde_json::json!({}))
            .await;
        assert!(!result.success);
        assert!(result.error_text.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn execute_enabled_tool_succeeds() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let result = reg
            .execute(CancellationToken::new(), "echo", serde_json::json!({"a": 1}))
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn execute_disabled_tool_fails_without_running() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg.set_enabled(&[]);
        let result = reg
            .execute(CancellationToken::new(), "echo", serde_json::json!({}))
            .await;
        assert!(!result.success);
        assert!(result.error_text.unwrap().contains("disabled"));
    }

    #[test]
    fn set_enabled_silently_ignores_code_executor_without_opt_in() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg.tools.insert(CODE_EXECUTOR_NAME.to_string(), Arc::new(EchoTool) as Arc<dyn ToolExecutor>);
        reg.enabled
            .write()
            .unwrap()
            .insert(CODE_EXECUTOR_NAME.to_string(), false);

        reg.set_enabled(&[CODE_EXECUTOR_NAME.to_string()]);

        assert_eq!(*reg.enabled.read().unwrap().get(CODE_EXECUTOR_NAME).unwrap(), false);
    }

    #[test]
    fn with_builtins_registers_four_tools_with_code_executor_disabled() {
        let reg = ToolRegistry::with_builtins();
        assert_eq!(reg.len(), 4);
        assert_eq!(
            *reg.enabled.read().unwrap().get(CODE_EXECUTOR_NAME).unwrap(),
            false
        );
        assert_eq!(*reg.enabled.read().unwrap().get("calculator").unwrap(), true);
    }

    #[test]
    fn names_lists_every_registered_tool_regardless_of_enabled_state() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg.set_enabled(&[]);
        assert_eq!(reg.names(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn execute_times_out_a_tool_that_never_finishes() {
        // The default per-tool timeout (30s) is too slow for a unit test;
        // this just documents that cancellation also interrupts execution.
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(SlowTool));
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cancel2.cancel();
        });
        let result = reg.execute(cancel, "slow", serde_json::json!({})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn a_cache_hit_short_circuits_execution() {
        struct CountingTool(std::sync::atomic::AtomicUsize);
        impl ToolExecutor for CountingTool {
            fn name(&self) -> &str {
                "counting"
            }
            fn description(&self) -> &str {
                "counts calls"
            }
            fn execute(
                &self,
                _ctx: &ToolContext,
                _input: serde_json::Value,
            ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
                let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Box::pin(async move { Ok(n.to_string()) })
            }
        }

        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(CountingTool(std::sync::atomic::AtomicUsize::new(0))));
        let cache = Arc::new(ResultCache::new(Some(std::time::Duration::from_secs(60)), 16));
        let reg = reg.with_cache(cache);

        let first = reg.execute(CancellationToken::new(), "counting", serde_json::json!({})).await;
        let second = reg.execute(CancellationToken::new(), "counting", serde_json::json!({})).await;
        assert_eq!(first.output, second.output);
    }
}
