//! Translation between the unified contract and the OpenAI Chat Completions
//! wire format. Grounded on `neuron-provider-openai/src/types.rs`'s
//! `OpenAIMessage`/`OpenAIToolCall` shapes.

use serde_json::{Value, json};
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{
    ChatOptions, ChatResponse, FinishReason, Message, Role, TokenUsage, ToolCall, ToolDefinition,
};

/// OpenAI folds `system` into `messages` as a literal `system`-role entry
/// (unlike Anthropic's top-level field) and represents a tool result as a
/// `role: "tool"` message carrying `tool_call_id`, matching the spec's
/// `Message` data model directly.
pub fn to_api_request(opts: &ChatOptions, default_model: &str) -> Value {
    let model = if opts.model.is_empty() { default_model } else { &opts.model };

    let mut messages = Vec::new();
    if let Some(system) = &opts.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    for msg in &opts.messages {
        if msg.role == Role::System {
            if opts.system.is_none() {
                messages.push(json!({"role": "system", "content": msg.content}));
            }
            continue;
        }
        messages.push(to_api_message(msg));
    }

    let mut body = json!({"model": model, "messages": messages});
    if let Some(max_tokens) = opts.max_tokens {
        body["max_completion_tokens"] = json!(max_tokens);
    }
    if let Some(temp) = opts.temperature {
        body["temperature"] = json!(temp);
    }
    if !opts.tools.is_empty() {
        body["tools"] = json!(opts.tools.iter().map(to_api_tool).collect::<Vec<_>>());
    }
    body
}

fn to_api_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        },
    })
}

fn to_api_message(msg: &Message) -> Value {
    match msg.role {
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            let mut out = json!({"role": "assistant", "content": msg.content});
            if let Some(calls) = &msg.tool_calls {
                out["tool_calls"] = json!(
                    calls
                        .iter()
                        .map(|c| json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": serde_json::to_string(&c.arguments).unwrap_or_default(),
                            },
                        }))
                        .collect::<Vec<_>>()
                );
            }
            out
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::System => unreachable!("system messages are handled before mapping"),
    }
}

pub fn from_api_response(json: &Value) -> Result<ChatResponse, ProviderError> {
    let choice = &json["choices"][0];
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let args_str = call["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            tool_calls.push(ToolCall {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                arguments,
            });
        }
    }

    let finish_reason = map_finish_reason(choice["finish_reason"].as_str().unwrap_or("stop"));
    let usage = TokenUsage {
        input_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(ChatResponse { content, tool_calls, finish_reason, usage })
}

pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_calls" => FinishReason::ToolUse,
        "length" => FinishReason::MaxTokens,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_becomes_leading_system_message() {
        let opts = ChatOptions {
            model: "gpt-4o".into(),
            system: Some("be terse".into()),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let body = to_api_request(&opts, "gpt-4o");
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["role"], json!("user"));
    }

    #[test]
    fn tool_call_arguments_are_json_encoded_strings() {
        let call = tiny_agent_types::types::ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            arguments: json!({"path": "a.txt"}),
        };
        let msg = Message::assistant("", vec![call]);
        let opts = ChatOptions { model: "gpt-4o".into(), messages: vec![msg], ..Default::default() };
        let body = to_api_request(&opts, "gpt-4o");
        let args = body["messages"][0]["tool_calls"][0]["function"]["arguments"].as_str().unwrap();
        assert_eq!(args, r#"{"path":"a.txt"}"#);
    }

    #[test]
    fn parses_tool_calls_response() {
        let resp = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "c1", "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}
                    }]
                },
                "finish_reason": "tool_calls",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
        });
        let parsed = from_api_response(&resp).unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.finish_reason, FinishReason::ToolUse);
    }
}
