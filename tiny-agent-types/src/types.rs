//! Core data model: messages, tool calls, memories, skills, MCP definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A conversational role. Unlike the teacher's `Role` (which folds tool
/// results into `User`-role content blocks), this keeps a distinct `Tool`
/// variant so every message's `role` literally matches the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (prompt, loaded skills, synthetic memory block).
    System,
    /// End-user input.
    User,
    /// Model output, optionally carrying `tool_calls`.
    Assistant,
    /// A tool's result, linked back to its call via `tool_call_id`.
    Tool,
}

/// A single message in conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,
    /// Textual content. Empty string is valid (e.g. an assistant turn that
    /// only calls tools).
    pub content: String,
    /// Ordered tool calls the assistant requested, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// The id of the tool call this message answers. Mandatory when
    /// `role == Role::Tool`, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Construct a plain system/user/assistant message with no tool linkage.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Construct a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Construct a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Construct an assistant message, optionally carrying tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    /// Construct a tool-result message answering `tool_call_id`.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the turn.
    pub id: String,
    /// Name of the tool to invoke; matches a registered [`ToolDefinition::name`].
    pub name: String,
    /// Arguments, expected to conform to the tool's declared parameter schema.
    pub arguments: serde_json::Value,
}

/// The outcome of executing one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded.
    pub success: bool,
    /// Meaningful when `success` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Meaningful when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result carrying `output`.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    /// A failed result carrying `error`.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// The text that should be appended to history as the tool message's
    /// content — `output` on success, `error` on failure.
    #[must_use]
    pub fn to_message_content(&self) -> String {
        if self.success {
            self.output.clone().unwrap_or_default()
        } else {
            self.error.clone().unwrap_or_default()
        }
    }
}

/// The JSON-schema declaration of a tool, as published to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Matches `[a-zA-Z_][a-zA-Z0-9_-]*`, unique within a registry.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema object describing accepted arguments.
    pub input_schema: serde_json::Value,
}

/// Category a [`Memory`] belongs to; drives the relevance-score weight in
/// the Memory Store (`user`: 1.0, `project`: 1.5, `codebase`: 1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    /// A fact the user explicitly asked to remember.
    User,
    /// A fact about the current project (conventions, decisions).
    Project,
    /// A fact about the codebase itself (architecture, gotchas).
    Codebase,
}

impl MemoryCategory {
    /// The fixed relevance-score weight for this category (spec §4.2 —
    /// hand-tuned weights from the source are replaced by these fixed
    /// values; no provider-specific tuning knob is exposed).
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::User => 1.0,
            Self::Project => 1.5,
            Self::Codebase => 1.2,
        }
    }
}

/// A persisted long-lived fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier.
    pub id: String,
    /// The remembered text.
    pub content: String,
    /// Which bucket this memory belongs to.
    pub category: MemoryCategory,
    /// When the memory was created.
    pub created_at: DateTime<Utc>,
    /// When the memory was last read via `get`/`findRelevant`.
    pub last_accessed_at: DateTime<Utc>,
    /// Number of times the memory has been read.
    pub access_count: u64,
}

/// A discoverable capability pack parsed from a `SKILL.md` file's YAML
/// frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Matches `^[a-z0-9]+(-[a-z0-9]+)*$`.
    pub name: String,
    /// One-line description shown in `skill list`.
    pub description: String,
    /// Filesystem path, or `builtin://<name>` for bundled skills.
    pub location: String,
    /// Whether this skill ships with the binary rather than being
    /// discovered on disk.
    pub is_builtin: bool,
    /// Tool names this skill restricts the registry to, if any. Accepts
    /// either a YAML sequence or a space-delimited string on the wire (see
    /// [`allowed_tools_de`]); always serialized back out as a sequence.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "allowed_tools_de"
    )]
    pub allowed_tools: Option<Vec<String>>,
}

/// Deserializes `allowedTools` from either a YAML array or a single
/// space-delimited string (spec §9 open question: both encodings exist in
/// the wild; we normalize to `Vec<String>` and always emit the array form).
pub fn allowed_tools_de<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoding {
        List(Vec<String>),
        Spaced(String),
    }

    let encoding: Option<Encoding> = Option::deserialize(deserializer)?;
    Ok(encoding.map(|e| match e {
        Encoding::List(v) => v,
        Encoding::Spaced(s) => s.split_whitespace().map(str::to_string).collect(),
    }))
}

/// A tool exposed by a connected MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolDef {
    /// The tool's name as published by the server (not yet prefixed).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: serde_json::Value,
}

/// Static configuration for one MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Registered name, used as the prefix for bridged tool names.
    pub name: String,
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables layered onto the filtered allowlist.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Runtime state of a registered MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    /// Static configuration.
    pub config: McpServerConfig,
    /// Whether the server is currently connected.
    pub connected: bool,
    /// Tools discovered via `tools/list`.
    pub tools: Vec<McpToolDef>,
}

/// Token accounting reported alongside every stream chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    /// Tokens in the system prompt message.
    pub system_prompt_tokens: usize,
    /// Tokens in the synthetic memory message.
    pub memory_tokens: usize,
    /// Tokens in the selected conversation history.
    pub conversation_tokens: usize,
    /// Sum of the three above.
    pub total_tokens: usize,
    /// The budget this composition was computed against.
    pub max_context_tokens: usize,
}

/// What an LLM backend supports for a given model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the model accepts tool declarations at all.
    pub supports_tools: bool,
    /// Whether the backend can stream partial output.
    pub supports_streaming: bool,
    /// Whether a system prompt is a first-class request field (vs. folded
    /// into the first user message).
    pub supports_system_prompt: bool,
    /// Whether tool-call arguments may arrive as incremental deltas.
    pub supports_tool_streaming: bool,
    /// Whether the model supports an extended-thinking / reasoning mode.
    pub supports_thinking: bool,
    /// Total context window in tokens, if known.
    pub context_window: Option<u32>,
    /// Maximum output tokens, if known.
    pub max_output_tokens: Option<u32>,
}

/// Token usage reported by a provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced in the response.
    pub output_tokens: u64,
}

/// Why a completion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a final answer with no further tool calls.
    EndTurn,
    /// The model requested one or more tool calls.
    ToolUse,
    /// Output was truncated at the token limit.
    MaxTokens,
    /// Output was withheld by a content filter.
    ContentFilter,
    /// The request was cancelled before completion.
    Cancelled,
}

/// An incremental fragment of a tool call, keyed by `index` within the
/// response. Consumers concatenate `arguments_delta` fragments per index
/// until the stream's final chunk or a superseding index arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPartial {
    /// Position of this tool call within the response.
    pub index: usize,
    /// Present once, on the chunk that introduces this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Present once, on the chunk that introduces this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A fragment of the JSON-encoded arguments string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_delta: Option<String>,
}

/// One chunk of a streaming completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// A fragment of assistant text, if any arrived in this chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool-call fragments that arrived in this chunk.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallPartial>,
    /// Whether this is the final chunk of the stream.
    pub done: bool,
    /// Token accounting, usually only present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Why the stream ended, present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// A fully materialized (non-streaming) completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's text content.
    pub content: String,
    /// Tool calls the model requested, fully formed.
    pub tool_calls: Vec<ToolCall>,
    /// Why the response ended.
    pub finish_reason: FinishReason,
    /// Token accounting.
    pub usage: TokenUsage,
}

impl Default for FinishReason {
    fn default() -> Self {
        Self::EndTurn
    }
}

/// Request parameters shared by `chat` and `stream`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Model identifier; provider-specific.
    pub model: String,
    /// Full message history to send.
    pub messages: Vec<Message>,
    /// Tool declarations to advertise, already filtered by skill
    /// restriction and capability checks.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// System prompt, sent via the backend's native system-prompt field
    /// when `Capabilities::supports_system_prompt` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Extended-thinking / reasoning configuration, honored only when
    /// `Capabilities::supports_thinking` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

/// Extended-thinking request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Token budget reserved for the model's internal reasoning.
    pub budget_tokens: u32,
}

/// Ceilings enforced by the Agent Loop across a turn, generalizing
/// `maxIterations` into a small family of budget checks (token spend,
/// request count, tool-call count) — see SPEC_FULL.md §10.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    /// Maximum number of provider requests in the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    /// Maximum cumulative input+output tokens in the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Maximum number of tool calls executed in the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u32>,
}

impl UsageLimits {
    /// Set the request-count ceiling.
    #[must_use]
    pub fn with_request_limit(mut self, n: u32) -> Self {
        self.max_requests = Some(n);
        self
    }

    /// Set the token-budget ceiling.
    #[must_use]
    pub fn with_token_limit(mut self, n: u64) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Set the tool-call-count ceiling.
    #[must_use]
    pub fn with_tool_call_limit(mut self, n: u32) -> Self {
        self.max_tool_calls = Some(n);
        self
    }
}

/// Optional progress callback threaded through long-running tool
/// executions (bash commands, large greps) — see SPEC_FULL.md §10.5.
pub type ProgressReporter = std::sync::Arc<dyn Fn(&str) + Send + Sync>;

/// Where one tool call stands within an Agent Loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionStatus {
    /// Dispatched to `executeBatch`, result not back yet.
    Running,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Error,
}

/// One tool call's progress, as surfaced to an [`AgentChunk`] consumer.
/// Carries `args`/`output`/`error` only once they're known: a `running`
/// chunk has `args` but no `output`/`error` yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Name of the tool invoked.
    pub name: String,
    /// Current status of this call.
    pub status: ToolExecutionStatus,
    /// Arguments the model supplied.
    pub args: serde_json::Value,
    /// Present once `status` is `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Present once `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One unit of the Agent Loop's lazy output sequence (spec §4.9).
/// A single iteration yields a handful of these: zero or more
/// content-bearing chunks while the model streams text, one chunk
/// announcing the tool calls about to run, one chunk per completed tool
/// result, and finally a `done` chunk once the turn either finishes or
/// hits `maxIterations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentChunk {
    /// A fragment of assistant text, if this chunk carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool executions reported in this chunk (usually one, or a batch of
    /// `running` announcements at the start of an iteration).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_executions: Vec<ToolExecution>,
    /// Token accounting for the composition that produced this iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_stats: Option<ContextStats>,
    /// Whether the turn has finished (terminal chunk).
    pub done: bool,
    /// The iteration number this chunk belongs to (1-indexed).
    pub iterations: usize,
    /// Set on the terminal chunk if the turn ended by hitting
    /// `maxIterations` rather than a tool-call-free assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations_reached: Option<bool>,
    /// Set on the terminal chunk if the turn ended because the caller's
    /// `CancellationToken` fired (spec Scenario 3 / invariant P6),
    /// distinguishing a cancelled turn from any other termination.
    #[serde(default)]
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_message_content() {
        assert_eq!(ToolResult::ok("hi").to_message_content(), "hi");
        assert_eq!(ToolResult::err("bad").to_message_content(), "bad");
    }

    #[test]
    fn memory_category_weights() {
        assert_eq!(MemoryCategory::User.weight(), 1.0);
        assert_eq!(MemoryCategory::Project.weight(), 1.5);
        assert_eq!(MemoryCategory::Codebase.weight(), 1.2);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn allowed_tools_accepts_array() {
        let skill: Skill = serde_json::from_value(serde_json::json!({
            "name": "git-helper",
            "description": "helps with git",
            "location": "builtin://git-helper",
            "is_builtin": true,
            "allowedTools": ["bash", "read_file"]
        }))
        .unwrap();
        assert_eq!(
            skill.allowed_tools,
            Some(vec!["bash".to_string(), "read_file".to_string()])
        );
    }

    #[test]
    fn allowed_tools_accepts_space_delimited_string() {
        let skill: Skill = serde_json::from_value(serde_json::json!({
            "name": "git-helper",
            "description": "helps with git",
            "location": "builtin://git-helper",
            "is_builtin": true,
            "allowedTools": "bash read_file"
        }))
        .unwrap();
        assert_eq!(
            skill.allowed_tools,
            Some(vec!["bash".to_string(), "read_file".to_string()])
        );
    }

    #[test]
    fn tool_pairing_roundtrip() {
        let call = ToolCall {
            id: "tu_1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "a.txt"}),
        };
        let assistant = Message::assistant("", vec![call.clone()]);
        let tool_msg = Message::tool_result(&call.id, "contents");
        assert_eq!(assistant.tool_calls.unwrap()[0].id, tool_msg.tool_call_id.unwrap());
    }
}
