//! Heuristic token estimation.
//!
//! Exact tokenization depends on a model's specific tokenizer, which the
//! Context Composer cannot link against for every provider. Instead this
//! crate estimates token counts with a fixed characters-per-token ratio,
//! the same heuristic the teacher's context-budgeting crate uses, plus a
//! small fixed per-message overhead to account for role/formatting tokens
//! that don't show up in the content string itself.

use tiny_agent_types::{Message, Role, ToolCall, ToolDefinition};

/// Average number of characters per token for English prose and code. The
/// teacher's counter defaults to the same ratio; it is a coarse estimate,
/// not a real tokenizer, and is expected to overshoot on dense code and
/// undershoot on short identifiers.
const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Fixed token overhead charged per message for role/turn framing, mirrors
/// the flat per-block costs the teacher's counter applies to non-text
/// content blocks.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Fixed overhead charged per tool call for its id/name framing, on top of
/// the JSON-encoded arguments' own estimated length.
const TOOL_CALL_OVERHEAD_TOKENS: usize = 6;

/// Estimates token counts from raw text using a fixed chars-per-token
/// ratio. Cheap, approximate, and good enough to drive budget splits —
/// never to be used for provider-side truncation decisions.
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: f64,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenCounter {
    /// A counter using the default chars-per-token ratio.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter using a custom chars-per-token ratio, for tuning against a
    /// specific model family's tokenizer if one is known to diverge from
    /// the default.
    #[must_use]
    pub fn with_ratio(chars_per_token: f64) -> Self {
        Self { chars_per_token }
    }

    /// Estimates the token count of a raw string.
    #[must_use]
    pub fn estimate_str(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        ((text.chars().count() as f64) / self.chars_per_token).ceil() as usize
    }

    /// Estimates the token count of one [`ToolCall`]: its JSON-encoded
    /// arguments plus a fixed overhead for the id/name framing.
    #[must_use]
    pub fn estimate_tool_call(&self, call: &ToolCall) -> usize {
        let args = serde_json::to_string(&call.arguments).unwrap_or_default();
        TOOL_CALL_OVERHEAD_TOKENS + self.estimate_str(&call.name) + self.estimate_str(&args)
    }

    /// Estimates the token count of one [`Message`], including its role,
    /// content, tool calls, and tool-call-id linkage.
    #[must_use]
    pub fn estimate_message(&self, message: &Message) -> usize {
        let mut total = MESSAGE_OVERHEAD_TOKENS + self.estimate_str(&message.content);
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                total += self.estimate_tool_call(call);
            }
        }
        if let Some(id) = &message.tool_call_id {
            total += self.estimate_str(id);
        }
        total
    }

    /// Estimates the total token count of a message slice, as composed for
    /// a single request.
    #[must_use]
    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }

    /// Estimates the token count of a tool's JSON-schema declaration, as
    /// sent to the provider alongside the request.
    #[must_use]
    pub fn estimate_tool_definition(&self, def: &ToolDefinition) -> usize {
        let schema = serde_json::to_string(&def.input_schema).unwrap_or_default();
        self.estimate_str(&def.name) + self.estimate_str(&def.description) + self.estimate_str(&schema)
    }

    /// Estimates the total token count of a tool-definition slice.
    #[must_use]
    pub fn estimate_tool_definitions(&self, defs: &[ToolDefinition]) -> usize {
        defs.iter().map(|d| self.estimate_tool_definition(d)).sum()
    }
}

/// Truncates `text` to fit within `max_tokens` under the default counter,
/// appending a marker so callers can tell truncation occurred. Used by the
/// Context Composer when a single message alone exceeds its budget slice.
#[must_use]
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let counter = TokenCounter::default();
    if counter.estimate_str(text) <= max_tokens {
        return text.to_string();
    }
    let max_chars = ((max_tokens as f64) * counter.chars_per_token).floor() as usize;
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("\n… [truncated]");
    truncated
}

/// Convenience: the synthetic role label used when estimating a message
/// that hasn't been constructed yet (e.g. sizing a planned system prompt).
#[must_use]
pub fn estimate_role_overhead(role: Role) -> usize {
    match role {
        Role::System | Role::Tool => MESSAGE_OVERHEAD_TOKENS,
        Role::User | Role::Assistant => MESSAGE_OVERHEAD_TOKENS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_empty_string_as_zero() {
        let counter = TokenCounter::new();
        assert_eq!(counter.estimate_str(""), 0);
    }

    #[test]
    fn estimate_scales_with_ratio() {
        let coarse = TokenCounter::with_ratio(4.0);
        let fine = TokenCounter::with_ratio(2.0);
        let text = "a".repeat(100);
        assert!(fine.estimate_str(&text) > coarse.estimate_str(&text));
    }

    #[test]
    fn message_overhead_applies_even_to_empty_content() {
        let counter = TokenCounter::new();
        let msg = Message::new(Role::System, "");
        assert_eq!(counter.estimate_message(&msg), MESSAGE_OVERHEAD_TOKENS);
    }

    #[test]
    fn tool_call_adds_overhead_on_top_of_arguments() {
        let counter = TokenCounter::new();
        let call = ToolCall {
            id: "tu_1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "src/lib.rs"}),
        };
        let msg = Message::assistant("", vec![call.clone()]);
        assert!(counter.estimate_message(&msg) > counter.estimate_tool_call(&call));
    }

    #[test]
    fn truncate_respects_budget() {
        let long = "word ".repeat(1000);
        let truncated = truncate_to_tokens(&long, 10);
        let counter = TokenCounter::new();
        assert!(counter.estimate_str(&truncated) <= 10 + counter.estimate_str("\n… [truncated]"));
    }
}
