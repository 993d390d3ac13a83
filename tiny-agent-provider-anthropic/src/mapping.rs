//! Translation between the unified [`ChatOptions`]/[`ChatResponse`] contract
//! and Anthropic's Messages API JSON shape.

use serde_json::{Value, json};
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{
    ChatOptions, ChatResponse, FinishReason, Message, Role, ToolCall, ToolDefinition, TokenUsage,
};

/// Anthropic's Messages API has no literal `tool` role: a tool result is a
/// `user`-role message carrying a `tool_result` content block. System
/// messages are hoisted out of `messages` entirely into a top-level `system`
/// field. This mirrors `neuron-provider-anthropic::mapping::to_api_request`.
pub fn to_api_request(opts: &ChatOptions, default_model: &str) -> Value {
    let model = if opts.model.is_empty() { default_model } else { &opts.model };

    let system_text = opts
        .system
        .clone()
        .or_else(|| {
            opts.messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.clone())
        });

    let mut messages = Vec::new();
    for msg in opts.messages.iter().filter(|m| m.role != Role::System) {
        messages.push(to_api_message(msg));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": opts.max_tokens.unwrap_or(4096),
    });

    if let Some(system) = system_text {
        body["system"] = json!(system);
    }
    if let Some(temp) = opts.temperature {
        body["temperature"] = json!(temp);
    }
    if !opts.tools.is_empty() {
        body["tools"] = json!(opts.tools.iter().map(to_api_tool).collect::<Vec<_>>());
    }
    if let Some(thinking) = opts.thinking {
        body["thinking"] = json!({"type": "enabled", "budget_tokens": thinking.budget_tokens});
    }

    body
}

fn to_api_tool(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn to_api_message(msg: &Message) -> Value {
    match msg.role {
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            let mut content = Vec::new();
            if !msg.content.is_empty() {
                content.push(json!({"type": "text", "text": msg.content}));
            }
            for call in msg.tool_calls.iter().flatten() {
                content.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.arguments,
                }));
            }
            json!({"role": "assistant", "content": content})
        }
        Role::Tool => {
            let id = msg.tool_call_id.clone().unwrap_or_default();
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": id,
                    "content": msg.content,
                }],
            })
        }
        Role::System => unreachable!("system messages are hoisted before mapping"),
    }
}

/// Maps a complete (non-streaming) response body into [`ChatResponse`].
pub fn from_api_response(json: &Value) -> Result<ChatResponse, ProviderError> {
    let content_blocks = json["content"].as_array().cloned().unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &content_blocks {
        match block["type"].as_str() {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                name: block["name"].as_str().unwrap_or_default().to_string(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }

    let stop_reason = json["stop_reason"].as_str().unwrap_or("end_turn");
    let finish_reason = map_stop_reason(stop_reason);

    let usage = TokenUsage {
        input_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0),
    };

    Ok(ChatResponse { content: text, tool_calls, finish_reason, usage })
}

pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_use" => FinishReason::ToolUse,
        "max_tokens" => FinishReason::MaxTokens,
        "stop_sequence" | "end_turn" => FinishReason::EndTurn,
        "pause_turn" => FinishReason::EndTurn,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_agent_types::types::ChatOptions;

    fn opts(messages: Vec<Message>) -> ChatOptions {
        ChatOptions { model: "claude-sonnet-4-5".into(), messages, ..Default::default() }
    }

    #[test]
    fn hoists_system_message_out_of_messages_array() {
        let body = to_api_request(
            &opts(vec![Message::system("be terse"), Message::user("hi")]),
            "claude-sonnet-4-5",
        );
        assert_eq!(body["system"], json!("be terse"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn tool_result_becomes_user_tool_result_block() {
        let body = to_api_request(
            &opts(vec![Message::tool_result("call_1", "42")]),
            "claude-sonnet-4-5",
        );
        let msg = &body["messages"][0];
        assert_eq!(msg["role"], json!("user"));
        assert_eq!(msg["content"][0]["type"], json!("tool_result"));
        assert_eq!(msg["content"][0]["tool_use_id"], json!("call_1"));
    }

    #[test]
    fn parses_tool_use_response() {
        let resp = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "t1", "name": "read_file", "input": {"path": "a.txt"}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let parsed = from_api_response(&resp).unwrap();
        assert_eq!(parsed.content, "Let me check.");
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.finish_reason, FinishReason::ToolUse);
    }
}
