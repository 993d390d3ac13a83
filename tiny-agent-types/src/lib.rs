//! Core data model, error taxonomy, and provider contract shared by every
//! `tiny-agent` crate.

pub mod error;
pub mod provider;
pub mod types;

pub use error::{
    ConfigError, ConfirmError, ContextError, ConversationError, LoopError, McpError,
    MemoryStoreError, ProviderError, SearchError, SkillError, ToolError,
};
pub use provider::{detect_provider, ChatStream, Provider, ProviderKind};
pub use types::{
    allowed_tools_de, AgentChunk, Capabilities, ChatOptions, ChatResponse, ContextStats,
    FinishReason, McpServer, McpServerConfig, McpToolDef, Memory, MemoryCategory, Message,
    ProgressReporter, Role, Skill, StreamChunk, ThinkingConfig, ToolCall, ToolCallPartial,
    ToolDefinition, ToolExecution, ToolExecutionStatus, ToolResult, TokenUsage, UsageLimits,
};
