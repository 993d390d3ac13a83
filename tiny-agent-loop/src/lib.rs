//! The Agent Loop: the iterative stream → parse tool calls → execute →
//! re-invoke cycle (spec §4.9), the core around which every other
//! component (`tiny-agent-tool`, `tiny-agent-context`, `tiny-agent-memory`,
//! `tiny-agent-conversation`, `tiny-agent-skill`, `tiny-agent-types`'s
//! `Provider`) is assembled.
//!
//! Grounded on the teacher's `ReactOperator::run` (`_ref_brain`'s
//! reasoning-loop shape: stream a turn, collect tool requests, dispatch
//! them concurrently, append results, loop) and on the `async_stream::
//! try_stream!`-over-a-loop idiom used across the retrieval pack's other
//! agent loops. Unlike the teacher, which is generic over `P: Provider`
//! and yields its own response type, this loop is generic over nothing —
//! it holds `Arc<dyn Provider>`/`Arc<dyn Tool>` and yields the spec's
//! `AgentChunk` directly, since cyclic ownership (Agent ↔ Registry ↔
//! Skill) is resolved by keeping every collaborator behind an `Arc`
//! rather than generic parameters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tiny_agent_context::compose;
use tiny_agent_conversation::ConversationStore;
use tiny_agent_memory::MemoryStore;
use tiny_agent_skill::SkillRegistry;
use tiny_agent_tool::ToolRegistry;
use tiny_agent_types::{
    AgentChunk, ChatOptions, Message, Provider, ProviderError, ToolCall, ToolExecution,
    ToolExecutionStatus, UsageLimits,
};
use tokio_util::sync::CancellationToken;

/// Default cap on reasoning iterations within one user turn (spec §4.9).
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Default token budget for one context composition, used when the
/// caller's config doesn't override it.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 100_000;

/// Number of memories considered per turn (spec §4.9's `findRelevant(.., 10)`).
const MEMORIES_PER_TURN: usize = 10;

/// Cap on `RateLimited`/transient-error retries per iteration (spec §7:
/// "retry with exponential backoff up to 3×").
const MAX_PROVIDER_RETRIES: u32 = 3;

/// What a provider error calls for, per spec §7's error-kind table:
/// `ContextLength` gets one budget-halving retry, `RateLimited`/`Network`/
/// `Timeout`/`Unavailable` get exponential backoff up to
/// [`MAX_PROVIDER_RETRIES`], everything else surfaces immediately.
enum RetryDecision {
    HalveContextBudget,
    Backoff(Duration),
    Surface,
}

/// Classifies `err` into a [`RetryDecision`], mirroring the teacher's
/// `is_retryable()` consultation point (`neuron-op-react`'s
/// `ReactOperator::execute`, which maps a provider error to
/// `OperatorError::Retryable` vs `OperatorError::Model` at the same call
/// site) but adding the spec's two policies (retry count, budget halving)
/// the teacher leaves to its caller.
fn retry_decision(err: &ProviderError, context_halved: bool, retry_count: u32) -> RetryDecision {
    if matches!(err, ProviderError::ContextLength(_)) {
        return if context_halved { RetryDecision::Surface } else { RetryDecision::HalveContextBudget };
    }
    if err.is_retryable() && retry_count < MAX_PROVIDER_RETRIES {
        let delay = match err {
            ProviderError::RateLimited { retry_after: Some(delay) } => *delay,
            _ => Duration::from_millis(500 * 2u64.pow(retry_count)),
        };
        return RetryDecision::Backoff(delay);
    }
    RetryDecision::Surface
}

/// Everything the Agent Loop needs to run one turn, wired up once at
/// startup and shared across turns.
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    memories: Arc<MemoryStore>,
    conversation: Arc<ConversationStore>,
    skills: Arc<SkillRegistry>,
    system_prompt: String,
    max_iterations: usize,
    max_context_tokens: usize,
    max_memory_tokens: Option<usize>,
    usage_limits: UsageLimits,
}

impl Agent {
    /// An agent with the spec's default `maxIterations`/context budget and
    /// no usage ceilings. Use [`Agent::with_usage_limits`] to add ceilings.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memories: Arc<MemoryStore>,
        conversation: Arc<ConversationStore>,
        skills: Arc<SkillRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            memories,
            conversation,
            skills,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            max_memory_tokens: None,
            usage_limits: UsageLimits::default(),
        }
    }

    /// Override `maxIterations`.
    #[must_use]
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Override the context-composition token budget.
    #[must_use]
    pub fn with_max_context_tokens(mut self, n: usize) -> Self {
        self.max_context_tokens = n;
        self
    }

    /// Cap the memory slice of a composition (spec §4.3).
    #[must_use]
    pub fn with_max_memory_tokens(mut self, n: usize) -> Self {
        self.max_memory_tokens = Some(n);
        self
    }

    /// Attach per-turn usage ceilings (SPEC_FULL.md §10.5).
    #[must_use]
    pub fn with_usage_limits(mut self, limits: UsageLimits) -> Self {
        self.usage_limits = limits;
        self
    }

    /// Discoverable skills available to the `skill` tool. Exposed so a
    /// caller (the CLI) can scan additional skill directories before the
    /// first turn.
    #[must_use]
    pub fn skills(&self) -> &Arc<SkillRegistry> {
        &self.skills
    }

    /// Run one user turn, yielding [`AgentChunk`]s as the loop progresses.
    /// `cancel` aborts the turn cooperatively: the in-flight provider
    /// stream is dropped and any tool batch already dispatched is
    /// abandoned without appending corrupt history.
    pub fn run(
        self: Arc<Self>,
        user_input: String,
        model: String,
        cancel: CancellationToken,
    ) -> impl futures::Stream<Item = AgentChunk> {
        async_stream::stream! {
            self.tools.clear_restriction();
            self.conversation.append(Message::user(user_input.as_str())).await;

            let requests_used = AtomicU32::new(0);
            let tokens_used = AtomicU64::new(0);
            let tool_calls_used = AtomicU32::new(0);

            for iteration in 1..=self.max_iterations {
                if cancel.is_cancelled() {
                    yield cancelled(iteration);
                    return;
                }

                if let Some(limit) = self.usage_limits.max_requests {
                    if requests_used.load(Ordering::SeqCst) >= limit {
                        self.conversation.append(Message::system(format!(
                            "usage limit exceeded: max_requests ({limit})"
                        ))).await;
                        yield terminal(iteration);
                        return;
                    }
                }

                let mut context_halved = false;
                let mut retry_count: u32 = 0;
                let mut effective_context_tokens = self.max_context_tokens;

                let (content, pending) = 'attempt: loop {
                    let capabilities = self.provider.capabilities(&model);
                    let mut tools = self.tools.list();
                    if !capabilities.supports_tools {
                        tools = Vec::new();
                    }

                    let history = self.conversation.history().await;
                    let relevant = self.memories.find_relevant(&user_input, MEMORIES_PER_TURN).await;
                    let (messages, stats, _truncated) = compose(
                        &self.system_prompt,
                        &relevant,
                        &history,
                        effective_context_tokens,
                        self.max_memory_tokens,
                    );

                    let options = ChatOptions {
                        model: model.clone(),
                        messages,
                        tools,
                        ..Default::default()
                    };

                    requests_used.fetch_add(1, Ordering::SeqCst);
                    let stream_result = tokio::select! {
                        _ = cancel.cancelled() => {
                            yield cancelled(iteration);
                            return;
                        }
                        result = self.provider.stream(options) => result,
                    };

                    let mut stream = match stream_result {
                        Ok(stream) => stream,
                        Err(e) => {
                            match retry_decision(&e, context_halved, retry_count) {
                                RetryDecision::HalveContextBudget => {
                                    context_halved = true;
                                    effective_context_tokens = (effective_context_tokens / 2).max(1);
                                    continue 'attempt;
                                }
                                RetryDecision::Backoff(delay) => {
                                    retry_count += 1;
                                    tokio::select! {
                                        _ = cancel.cancelled() => {
                                            yield cancelled(iteration);
                                            return;
                                        }
                                        () = tokio::time::sleep(delay) => {}
                                    }
                                    continue 'attempt;
                                }
                                RetryDecision::Surface => {
                                    self.conversation.append(Message::system(format!("provider error: {e}"))).await;
                                    yield terminal(iteration);
                                    return;
                                }
                            }
                        }
                    };

                    let mut content = String::new();
                    let mut pending: BTreeMap<usize, PartialCall> = BTreeMap::new();
                    let mut stream_error: Option<ProviderError> = None;

                    loop {
                        let next = tokio::select! {
                            _ = cancel.cancelled() => {
                                yield cancelled(iteration);
                                return;
                            }
                            item = stream.next() => item,
                        };
                        let Some(item) = next else { break };
                        match item {
                            Ok(chunk) => {
                                if let Some(usage) = chunk.usage {
                                    tokens_used.fetch_add(usage.input_tokens + usage.output_tokens, Ordering::SeqCst);
                                }
                                if let Some(delta) = chunk.content {
                                    if !delta.is_empty() {
                                        content.push_str(&delta);
                                        yield AgentChunk {
                                            content: Some(delta),
                                            context_stats: Some(stats),
                                            iterations: iteration,
                                            ..Default::default()
                                        };
                                    }
                                }
                                for partial in chunk.tool_calls {
                                    let entry = pending.entry(partial.index).or_default();
                                    if let Some(id) = partial.id {
                                        entry.id = Some(id);
                                    }
                                    if let Some(name) = partial.name {
                                        entry.name = Some(name);
                                    }
                                    if let Some(delta) = partial.arguments_delta {
                                        entry.arguments.push_str(&delta);
                                    }
                                }
                                if chunk.done {
                                    break;
                                }
                            }
                            Err(e) => {
                                stream_error = Some(e);
                                break;
                            }
                        }
                    }

                    if let Some(e) = stream_error {
                        match retry_decision(&e, context_halved, retry_count) {
                            RetryDecision::HalveContextBudget => {
                                context_halved = true;
                                effective_context_tokens = (effective_context_tokens / 2).max(1);
                                continue 'attempt;
                            }
                            RetryDecision::Backoff(delay) => {
                                retry_count += 1;
                                tokio::select! {
                                    _ = cancel.cancelled() => {
                                        yield cancelled(iteration);
                                        return;
                                    }
                                    () = tokio::time::sleep(delay) => {}
                                }
                                continue 'attempt;
                            }
                            RetryDecision::Surface => {
                                self.conversation.append(Message::system(format!("provider error: {e}"))).await;
                                yield terminal(iteration);
                                return;
                            }
                        }
                    }

                    break 'attempt (content, pending);
                };

                if let Some(limit) = self.usage_limits.max_tokens {
                    if tokens_used.load(Ordering::SeqCst) > limit {
                        self.conversation.append(Message::assistant(content.clone(), Vec::new())).await;
                        self.conversation.append(Message::system(format!(
                            "usage limit exceeded: max_tokens ({limit})"
                        ))).await;
                        yield terminal(iteration);
                        return;
                    }
                }

                let tool_calls: Vec<ToolCall> = pending
                    .into_values()
                    .filter_map(PartialCall::into_tool_call)
                    .collect();

                self.conversation
                    .append(Message::assistant(content, tool_calls.clone()))
                    .await;

                if tool_calls.is_empty() {
                    yield terminal(iteration);
                    return;
                }

                if let Some(unknown) = tool_calls.iter().find(|call| self.tools.get(&call.name).is_none()) {
                    self.conversation
                        .append(Message::system(format!("Tool \"{}\" not available", unknown.name)))
                        .await;
                    yield terminal(iteration);
                    return;
                }

                if let Some(limit) = self.usage_limits.max_tool_calls {
                    let used = tool_calls_used.fetch_add(tool_calls.len() as u32, Ordering::SeqCst) + tool_calls.len() as u32;
                    if used > limit {
                        self.conversation.append(Message::system(format!(
                            "usage limit exceeded: max_tool_calls ({limit})"
                        ))).await;
                        yield terminal(iteration);
                        return;
                    }
                }

                yield AgentChunk {
                    tool_executions: tool_calls
                        .iter()
                        .map(|call| ToolExecution {
                            name: call.name.clone(),
                            status: ToolExecutionStatus::Running,
                            args: call.arguments.clone(),
                            output: None,
                            error: None,
                        })
                        .collect(),
                    iterations: iteration,
                    ..Default::default()
                };

                let results = tokio::select! {
                    _ = cancel.cancelled() => {
                        yield cancelled(iteration);
                        return;
                    }
                    results = self.tools.execute_batch(&tool_calls) => results,
                };

                for (call, result) in tool_calls.iter().zip(results.iter()) {
                    self.conversation
                        .append(Message::tool_result(call.id.as_str(), result.to_message_content()))
                        .await;
                    yield AgentChunk {
                        tool_executions: vec![ToolExecution {
                            name: call.name.clone(),
                            status: if result.success { ToolExecutionStatus::Complete } else { ToolExecutionStatus::Error },
                            args: call.arguments.clone(),
                            output: result.output.clone(),
                            error: result.error.clone(),
                        }],
                        iterations: iteration,
                        ..Default::default()
                    };
                }
            }

            yield terminal_max_iterations(self.max_iterations);
        }
    }
}

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PartialCall {
    fn into_tool_call(self) -> Option<ToolCall> {
        let id = self.id?;
        let name = self.name?;
        let arguments = if self.arguments.is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(&self.arguments) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %e, raw = %self.arguments, "malformed tool call arguments");
                    serde_json::json!({})
                }
            }
        };
        Some(ToolCall { id, name, arguments })
    }
}

/// A terminal chunk ending the turn for any reason other than exhausting
/// `maxIterations` or cancellation (tool-call-free assistant turn,
/// provider error, unknown tool name, usage limit).
fn terminal(iterations: usize) -> AgentChunk {
    AgentChunk {
        done: true,
        iterations,
        max_iterations_reached: None,
        ..Default::default()
    }
}

/// The terminal chunk for a turn ended by the caller's `CancellationToken`
/// firing (spec Scenario 3 / invariant P6).
fn cancelled(iterations: usize) -> AgentChunk {
    AgentChunk {
        done: true,
        iterations,
        max_iterations_reached: None,
        cancelled: true,
        ..Default::default()
    }
}

/// The terminal chunk for the one case spec §4.9 names explicitly: the
/// loop ran every iteration without the model ever returning a
/// tool-call-free turn.
fn terminal_max_iterations(iterations: usize) -> AgentChunk {
    AgentChunk {
        done: true,
        iterations,
        max_iterations_reached: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tiny_agent_confirm::ConfirmationBroker;
    use tiny_agent_types::{
        Capabilities, ChatResponse, ChatStream, FinishReason, ProviderError, StreamChunk, ToolResult,
    };

    struct ScriptedProvider {
        turns: Mutex<std::collections::VecDeque<Vec<StreamChunk>>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<StreamChunk>>) -> Self {
            Self { turns: Mutex::new(turns.into()) }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn capabilities(&self, _model: &str) -> Capabilities {
            Capabilities {
                supports_tools: true,
                supports_streaming: true,
                supports_system_prompt: true,
                ..Default::default()
            }
        }
        async fn chat(&self, _options: ChatOptions) -> Result<ChatResponse, ProviderError> {
            unimplemented!("not exercised by these tests")
        }
        async fn stream(&self, _options: ChatOptions) -> Result<ChatStream, ProviderError> {
            let chunks = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted provider ran out of turns");
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl tiny_agent_tool::Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> ToolResult {
            ToolResult::ok(args.to_string())
        }
    }

    fn agent_with(turns: Vec<Vec<StreamChunk>>) -> Arc<Agent> {
        let registry = Arc::new(ToolRegistry::with_confirmation_broker(ConfirmationBroker::new()));
        registry.register(Arc::new(EchoTool)).unwrap();
        Arc::new(Agent::new(
            Arc::new(ScriptedProvider::new(turns)),
            registry,
            Arc::new(MemoryStore::in_memory()),
            Arc::new(ConversationStore::in_memory()),
            Arc::new(SkillRegistry::new()),
            "be helpful",
        ))
    }

    #[tokio::test]
    async fn simple_turn_with_no_tool_calls_terminates() {
        let agent = agent_with(vec![vec![StreamChunk {
            content: Some("hi there".into()),
            done: true,
            finish_reason: Some(FinishReason::EndTurn),
            ..Default::default()
        }]]);

        let chunks: Vec<AgentChunk> = agent
            .run("hello".into(), "claude-test".into(), CancellationToken::new())
            .collect()
            .await;

        assert!(chunks.iter().any(|c| c.content.as_deref() == Some("hi there")));
        let last = chunks.last().unwrap();
        assert!(last.done);
        assert_eq!(last.iterations, 1);
        assert_eq!(last.max_iterations_reached, None);
    }

    #[tokio::test]
    async fn tool_call_round_trip_executes_and_continues() {
        use tiny_agent_types::ToolCallPartial;

        let agent = agent_with(vec![
            vec![StreamChunk {
                tool_calls: vec![ToolCallPartial {
                    index: 0,
                    id: Some("tu_1".into()),
                    name: Some("echo".into()),
                    arguments_delta: Some("{\"x\":1}".into()),
                }],
                done: true,
                finish_reason: Some(FinishReason::ToolUse),
                ..Default::default()
            }],
            vec![StreamChunk {
                content: Some("done".into()),
                done: true,
                finish_reason: Some(FinishReason::EndTurn),
                ..Default::default()
            }],
        ]);

        let chunks: Vec<AgentChunk> = agent
            .clone()
            .run("use echo".into(), "claude-test".into(), CancellationToken::new())
            .collect()
            .await;

        assert!(chunks.iter().any(|c| c
            .tool_executions
            .iter()
            .any(|t| t.status == tiny_agent_types::ToolExecutionStatus::Complete)));

        let history = agent.conversation.history().await;
        assert!(history.iter().any(|m| m.role == tiny_agent_types::Role::Tool));
        let last = chunks.last().unwrap();
        assert!(last.done);
        assert_eq!(last.iterations, 2);
    }

    #[tokio::test]
    async fn unknown_tool_name_terminates_with_system_note() {
        use tiny_agent_types::ToolCallPartial;

        let agent = agent_with(vec![vec![StreamChunk {
            tool_calls: vec![ToolCallPartial {
                index: 0,
                id: Some("tu_1".into()),
                name: Some("does_not_exist".into()),
                arguments_delta: Some("{}".into()),
            }],
            done: true,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }]]);

        let chunks: Vec<AgentChunk> = agent
            .clone()
            .run("hi".into(), "claude-test".into(), CancellationToken::new())
            .collect()
            .await;

        let history = agent.conversation.history().await;
        assert!(history.iter().any(|m| m.content.contains("not available")));
        assert!(chunks.last().unwrap().done);
    }

    #[tokio::test]
    async fn max_iterations_reached_flag_set() {
        let chunk = StreamChunk {
            content: Some("thinking".into()),
            tool_calls: vec![tiny_agent_types::ToolCallPartial {
                index: 0,
                id: Some("tu_1".into()),
                name: Some("echo".into()),
                arguments_delta: Some("{}".into()),
            }],
            done: true,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        };
        let turns = std::iter::repeat_with(|| vec![chunk.clone()]).take(DEFAULT_MAX_ITERATIONS).collect();
        let agent = agent_with(turns);

        let chunks: Vec<AgentChunk> = agent
            .run("loop forever".into(), "claude-test".into(), CancellationToken::new())
            .collect()
            .await;

        let last = chunks.last().unwrap();
        assert!(last.done);
        assert_eq!(last.max_iterations_reached, Some(true));
        assert_eq!(last.iterations, DEFAULT_MAX_ITERATIONS);
    }

    struct StallingProvider;

    #[async_trait]
    impl Provider for StallingProvider {
        fn name(&self) -> &str {
            "stalling"
        }
        fn capabilities(&self, _model: &str) -> Capabilities {
            Capabilities {
                supports_tools: true,
                supports_streaming: true,
                supports_system_prompt: true,
                ..Default::default()
            }
        }
        async fn chat(&self, _options: ChatOptions) -> Result<ChatResponse, ProviderError> {
            unimplemented!("not exercised by this test")
        }
        async fn stream(&self, _options: ChatOptions) -> Result<ChatStream, ProviderError> {
            let stream = async_stream::stream! {
                yield Ok(StreamChunk {
                    content: Some("partial".into()),
                    done: false,
                    ..Default::default()
                });
                // Never resolves within the test's timeframe: the cancellation
                // select! arm must win the race instead.
                tokio::time::sleep(Duration::from_secs(60)).await;
                yield Ok(StreamChunk { done: true, finish_reason: Some(FinishReason::EndTurn), ..Default::default() });
            };
            Ok(Box::pin(stream))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_stream_yields_cancelled_chunk() {
        let registry = Arc::new(ToolRegistry::with_confirmation_broker(ConfirmationBroker::new()));
        let agent = Arc::new(Agent::new(
            Arc::new(StallingProvider),
            registry,
            Arc::new(MemoryStore::in_memory()),
            Arc::new(ConversationStore::in_memory()),
            Arc::new(SkillRegistry::new()),
            "be helpful",
        ));

        let cancel = CancellationToken::new();
        let mut stream = agent.run("hi".into(), "claude-test".into(), cancel.clone());

        let first = stream.next().await.expect("first chunk");
        assert_eq!(first.content.as_deref(), Some("partial"));
        assert!(!first.done);

        cancel.cancel();

        let last = stream.next().await.expect("terminal chunk after cancellation");
        assert!(last.done);
        assert!(last.cancelled);
        assert!(stream.next().await.is_none());
    }
}
