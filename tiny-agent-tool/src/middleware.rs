//! Axum-style middleware chain wrapping tool execution.
//!
//! Mirrors `neuron-tool::middleware`'s `ToolMiddleware`/`Next`/
//! `tool_middleware_fn` shape: each stage gets the call and a `Next`
//! continuation it may run, skip, or wrap. This chain sits strictly
//! *inside* the registry's confirmation gate — by the time a call reaches
//! here, `execute_batch` has already decided it's allowed to run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tiny_agent_types::ToolResult;

use crate::Tool;

/// A boxed future a [`MiddlewareFn`] closure returns.
pub type NextFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// The rest of the middleware chain, terminating in the tool's own
/// `execute`.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn ToolMiddleware>],
    tool: &'a dyn Tool,
}

impl<'a> Next<'a> {
    fn new(middleware: &'a [Arc<dyn ToolMiddleware>], tool: &'a dyn Tool) -> Self {
        Self { middleware, tool }
    }

    /// Continue the chain: run the next stage, or the tool itself if this
    /// was the last one.
    pub async fn run(self, args: serde_json::Value) -> ToolResult {
        match self.middleware.split_first() {
            Some((stage, rest)) => stage.process(args, Next::new(rest, self.tool)).await,
            None => self.tool.execute(args).await,
        }
    }
}

/// One stage in the middleware chain.
#[async_trait::async_trait]
pub trait ToolMiddleware: Send + Sync {
    /// Observe/modify `args`, decide whether to call `next`, and
    /// observe/modify the resulting [`ToolResult`].
    async fn process(&self, args: serde_json::Value, next: Next<'_>) -> ToolResult;
}

/// The entry point the registry uses to run a tool through its configured
/// middleware stack.
pub(crate) struct Chain<'a> {
    middleware: &'a [Arc<dyn ToolMiddleware>],
    tool: &'a dyn Tool,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(middleware: &'a [Arc<dyn ToolMiddleware>], tool: &'a dyn Tool) -> Self {
        Self { middleware, tool }
    }

    pub(crate) async fn run(self, args: serde_json::Value) -> ToolResult {
        Next::new(self.middleware, self.tool).run(args).await
    }
}

/// A [`ToolMiddleware`] built from a closure, for one-off stages that
/// don't warrant a named type.
pub struct MiddlewareFn<F> {
    f: F,
}

#[async_trait::async_trait]
impl<F> ToolMiddleware for MiddlewareFn<F>
where
    F: for<'a> Fn(serde_json::Value, Next<'a>) -> NextFuture<'a> + Send + Sync,
{
    async fn process(&self, args: serde_json::Value, next: Next<'_>) -> ToolResult {
        (self.f)(args, next).await
    }
}

/// Wrap a closure as a [`ToolMiddleware`] stage.
pub fn tool_middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a> Fn(serde_json::Value, Next<'a>) -> NextFuture<'a> + Send + Sync,
{
    MiddlewareFn { f }
}

/// Truncates a successful tool's `output` to `max_chars`, char-boundary
/// safe since it rebuilds the string from a `chars()` iterator rather than
/// slicing bytes. Long tool outputs otherwise consume an outsized share of
/// the conversation token budget.
pub struct OutputTruncator {
    max_chars: usize,
}

impl OutputTruncator {
    /// A truncator capping output at `max_chars` characters.
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait::async_trait]
impl ToolMiddleware for OutputTruncator {
    async fn process(&self, args: serde_json::Value, next: Next<'_>) -> ToolResult {
        let mut result = next.run(args).await;
        if let Some(output) = &result.output {
            let char_count = output.chars().count();
            if char_count > self.max_chars {
                let truncated: String = output.chars().take(self.max_chars).collect();
                result.output = Some(format!(
                    "{truncated}... [truncated, {char_count} chars total]"
                ));
            }
        }
        result
    }
}
