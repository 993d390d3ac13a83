//! Typed catalog of callable tools, danger gating, and concurrent batch
//! execution.
//!
//! The teacher's `neuron-tool` splits this into three pieces: an
//! object-safe `ToolDyn` trait executed through hand-rolled
//! `Pin<Box<dyn Future>>` returns, an axum-style `ToolMiddleware` chain,
//! and a confirmation-free `ToolRegistry`. This crate keeps the same
//! object-safe-trait-plus-registry shape but switches to `#[async_trait]`
//! (the same dyn-compatibility tradeoff already used for `Provider`) and
//! folds confirmation directly into the registry's `execute_batch`, since
//! the spec's batching algorithm (§4.5) treats confirmation as the
//! registry's own responsibility rather than an optional middleware layer.

mod middleware;

pub use middleware::{tool_middleware_fn, MiddlewareFn, Next, OutputTruncator, ToolMiddleware};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tiny_agent_confirm::{ConfirmationAction, ConfirmationBroker, ConfirmationRequest};
use tiny_agent_types::{ToolCall, ToolDefinition, ToolError, ToolResult};

/// The default per-call execution timeout when no override is configured.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// A callable tool. `name`/`description`/`parameters` publish the tool's
/// schema to the model; `dangerous` decides whether a call needs
/// confirmation before `execute` runs.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Matches `[a-zA-Z_][a-zA-Z0-9_-]*`, unique within a registry.
    fn name(&self) -> &str;

    /// Shown to the model alongside the tool's schema.
    fn description(&self) -> &str;

    /// JSON Schema object describing accepted arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Whether a call with these arguments requires confirmation, and if
    /// so the prompt to show. Covers all three shapes the spec allows for
    /// a tool's `dangerous` field: `false` is the default `None` here;
    /// `true` is [`default_dangerous_message`]; a fixed string or a
    /// per-argument decision is whatever the implementation returns.
    fn dangerous(&self, _args: &serde_json::Value) -> Option<String> {
        None
    }

    /// Run the tool. Never called for a call the registry resolved as
    /// denied or unknown.
    async fn execute(&self, args: serde_json::Value) -> ToolResult;
}

/// The default confirmation prompt for a tool whose `dangerous` field is
/// simply `true` rather than a specific message.
#[must_use]
pub fn default_dangerous_message(name: &str) -> String {
    format!("Execute {name}")
}

/// Owns `name → Tool`, the active skill-imposed `allowedTools` restriction
/// (schema publication only — see [`ToolRegistry::set_restriction`]), and
/// the confirmation broker `execute_batch` consults for dangerous calls.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    restriction: RwLock<Option<HashSet<String>>>,
    confirm: Option<ConfirmationBroker>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    default_timeout: Duration,
    per_tool_timeout: HashMap<String, Duration>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// An empty registry with no confirmation broker installed — every
    /// dangerous call is denied until one is attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            restriction: RwLock::new(None),
            confirm: None,
            middleware: Vec::new(),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
            per_tool_timeout: HashMap::new(),
        }
    }

    /// A registry that consults `broker` before running dangerous calls.
    #[must_use]
    pub fn with_confirmation_broker(broker: ConfirmationBroker) -> Self {
        Self {
            confirm: Some(broker),
            ..Self::new()
        }
    }

    /// Install a middleware stage, run in registration order around every
    /// `execute` call (output truncation, etc). Separate from the
    /// confirmation gate, which is not a middleware stage — it runs once
    /// per batch, not once per call.
    pub fn use_middleware(&mut self, middleware: Arc<dyn ToolMiddleware>) {
        self.middleware.push(middleware);
    }

    /// Override the per-call execution timeout for `name`.
    pub fn set_tool_timeout(&mut self, name: impl Into<String>, timeout: Duration) {
        self.per_tool_timeout.insert(name.into(), timeout);
    }

    /// Register a tool. Fails if `name` already exists.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name, ignoring the active restriction — used for
    /// execution, where a restriction only gates what the model is shown,
    /// not what it's allowed to call once named.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Every tool's definition, filtered to the active restriction if one
    /// is set.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        let restriction = self.restriction.read().expect("restriction lock poisoned");
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .values()
            .filter(|tool| restriction.as_ref().is_none_or(|allowed| allowed.contains(tool.name())))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters(),
            })
            .collect()
    }

    /// `name`'s definition, or `None` if unregistered or restricted out.
    #[must_use]
    pub fn schema_for(&self, name: &str) -> Option<ToolDefinition> {
        let restriction = self.restriction.read().expect("restriction lock poisoned");
        if restriction.as_ref().is_some_and(|allowed| !allowed.contains(name)) {
            return None;
        }
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters(),
            })
    }

    /// Whether `name` called with `args` requires confirmation.
    #[must_use]
    pub fn is_dangerous(&self, name: &str, args: &serde_json::Value) -> bool {
        self.danger_level(name, args).is_some()
    }

    /// The confirmation prompt for `name` called with `args`, if any.
    #[must_use]
    pub fn danger_level(&self, name: &str, args: &serde_json::Value) -> Option<String> {
        self.get(name).and_then(|tool| tool.dangerous(args))
    }

    /// Restrict schema publication to `names` (a loaded skill's
    /// `allowedTools`). Cleared by the Agent Loop at the start of every new
    /// user turn.
    pub fn set_restriction(&self, names: Option<Vec<String>>) {
        let mut restriction = self.restriction.write().expect("restriction lock poisoned");
        *restriction = names.map(|names| names.into_iter().collect());
    }

    /// Drop the active restriction, if any.
    pub fn clear_restriction(&self) {
        self.set_restriction(None);
    }

    /// Runs `calls` to completion per spec §4.5:
    ///
    /// 1. Partition into dangerous and safe via `is_dangerous`.
    /// 2. Submit one [`ConfirmationRequest`] covering every dangerous
    ///    action, if any.
    /// 3. Denied calls become a declined-confirmation error without
    ///    invoking the tool.
    /// 4. Approved dangerous calls and all safe calls run concurrently;
    ///    results come back in input order.
    /// 5. An unknown tool name yields a not-found error for that slot
    ///    only; siblings are unaffected.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        enum Plan {
            Unknown,
            Run(Arc<dyn Tool>),
        }

        let mut plans = Vec::with_capacity(calls.len());
        let mut dangerous_slots = Vec::new();
        let mut dangerous_actions = Vec::new();

        for call in calls {
            match self.get(&call.name) {
                None => plans.push(Plan::Unknown),
                Some(tool) => {
                    if let Some(description) = tool.dangerous(&call.arguments) {
                        dangerous_slots.push(plans.len());
                        dangerous_actions.push(ConfirmationAction {
                            tool: call.name.clone(),
                            args: call.arguments.clone(),
                            description,
                        });
                    }
                    plans.push(Plan::Run(tool));
                }
            }
        }

        let denied: HashSet<usize> = if dangerous_slots.is_empty() {
            HashSet::new()
        } else {
            let request = ConfirmationRequest {
                actions: dangerous_actions,
            };
            let verdict = match &self.confirm {
                Some(broker) => broker.confirm(request).await.unwrap_or(
                    tiny_agent_confirm::ConfirmationResult::Deny,
                ),
                None => tiny_agent_confirm::ConfirmationResult::Deny,
            };
            dangerous_slots
                .into_iter()
                .enumerate()
                .filter(|(batch_index, _)| !verdict.approves(*batch_index))
                .map(|(_, call_slot)| call_slot)
                .collect()
        };

        let futures = calls.iter().zip(plans).enumerate().map(|(slot, (call, plan))| {
            let is_denied = denied.contains(&slot);
            async move {
                match plan {
                    Plan::Unknown => ToolResult::err(format!("Tool \"{}\" not found", call.name)),
                    Plan::Run(_) if is_denied => ToolResult::err("User declined confirmation"),
                    Plan::Run(tool) => self.run_one(&tool, call.arguments.clone()).await,
                }
            }
        });

        join_all(futures).await
    }

    async fn run_one(&self, tool: &Arc<dyn Tool>, args: serde_json::Value) -> ToolResult {
        let timeout = self
            .per_tool_timeout
            .get(tool.name())
            .copied()
            .unwrap_or(self.default_timeout);

        let chain = middleware::Chain::new(&self.middleware, tool.as_ref());
        match tokio::time::timeout(timeout, chain.run(args)).await {
            Ok(result) => result,
            Err(_) => ToolResult::err(format!("timed out after {timeout:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tiny_agent_confirm::{ConfirmationHandler, ConfirmationResult};

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> ToolResult {
            ToolResult::ok(args.to_string())
        }
    }

    struct DangerousTool;

    #[async_trait::async_trait]
    impl Tool for DangerousTool {
        fn name(&self) -> &str {
            "rm"
        }
        fn description(&self) -> &str {
            "Deletes things"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn dangerous(&self, _args: &serde_json::Value) -> Option<String> {
            Some(default_dangerous_message("rm"))
        }
        async fn execute(&self, _args: serde_json::Value) -> ToolResult {
            ToolResult::ok("deleted")
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: format!("tu_{name}"),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    #[test]
    fn register_rejects_name_collision() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(_)));
    }

    #[test]
    fn restriction_filters_list_and_schema_for() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(DangerousTool)).unwrap();
        registry.set_restriction(Some(vec!["echo".into()]));
        assert_eq!(registry.list().len(), 1);
        assert!(registry.schema_for("rm").is_none());
        assert!(registry.schema_for("echo").is_some());
        registry.clear_restriction();
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn restriction_does_not_block_get() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(DangerousTool)).unwrap();
        registry.set_restriction(Some(vec!["echo".into()]));
        assert!(registry.get("rm").is_some());
    }

    #[tokio::test]
    async fn unknown_tool_yields_not_found_without_affecting_siblings() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let results = registry
            .execute_batch(&[call("missing"), call("echo")])
            .await;
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Tool \"missing\" not found"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn safe_calls_run_without_confirmation_broker() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let results = registry.execute_batch(&[call("echo")]).await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn dangerous_call_denied_without_broker() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(DangerousTool)).unwrap();
        let results = registry.execute_batch(&[call("rm")]).await;
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("User declined confirmation"));
    }

    struct AlwaysApprove(AtomicUsize);

    #[async_trait::async_trait]
    impl ConfirmationHandler for AlwaysApprove {
        async fn confirm(&self, _request: tiny_agent_confirm::ConfirmationRequest) -> ConfirmationResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ConfirmationResult::Approve
        }
    }

    #[tokio::test]
    async fn dangerous_call_runs_when_broker_approves() {
        let handler = Arc::new(AlwaysApprove(AtomicUsize::new(0)));
        let broker = ConfirmationBroker::with_handler(handler.clone());
        let registry = ToolRegistry::with_confirmation_broker(broker);
        registry.register(Arc::new(DangerousTool)).unwrap();
        let results = registry.execute_batch(&[call("rm")]).await;
        assert!(results[0].success);
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mixed_batch_preserves_input_order() {
        let handler = Arc::new(AlwaysApprove(AtomicUsize::new(0)));
        let broker = ConfirmationBroker::with_handler(handler);
        let registry = ToolRegistry::with_confirmation_broker(broker);
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(DangerousTool)).unwrap();
        let results = registry
            .execute_batch(&[call("echo"), call("rm"), call("missing")])
            .await;
        assert!(results[0].success);
        assert!(results[1].success);
        assert!(!results[2].success);
    }

    #[tokio::test]
    async fn confirmation_submitted_once_per_batch() {
        let handler = Arc::new(AlwaysApprove(AtomicUsize::new(0)));
        let broker = ConfirmationBroker::with_handler(handler.clone());
        let registry = ToolRegistry::with_confirmation_broker(broker);
        registry.register(Arc::new(DangerousTool)).unwrap();
        let _ = registry
            .execute_batch(&[call("rm"), call("rm")])
            .await;
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn middleware_truncates_output() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.use_middleware(Arc::new(OutputTruncator::new(4)));
        let results = registry
            .execute_batch(&[ToolCall {
                id: "tu_1".into(),
                name: "echo".into(),
                arguments: serde_json::json!("hello world"),
            }])
            .await;
        assert!(results[0].output.as_ref().unwrap().contains("truncated"));
    }
}
