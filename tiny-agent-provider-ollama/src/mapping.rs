//! Translation between the unified contract and Ollama's native `/api/chat`
//! format. Grounded on `neuron-provider-ollama/src/mapping.rs`'s message
//! shape — tool calls carry structured `arguments` (a JSON object), not a
//! JSON-encoded string, which is the one meaningful divergence from the
//! OpenAI-style adapters.

use serde_json::{Value, json};
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{
    ChatOptions, ChatResponse, FinishReason, Message, Role, TokenUsage, ToolCall, ToolDefinition,
};

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
    let mut options = serde_json::Map::new();
    if let Some(temp) = opts.temperature {
        options.insert("temperature".into(), json!(temp));
    }
    if let Some(max_tokens) = opts.max_tokens {
        options.insert("num_predict".into(), json!(max_tokens));
    }
    if !options.is_empty() {
        body["options"] = Value::Object(options);
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
                        .map(|c| json!({"function": {"name": c.name, "arguments": c.arguments}}))
                        .collect::<Vec<_>>()
                );
            }
            out
        }
        Role::Tool => json!({"role": "tool", "content": msg.content}),
        Role::System => unreachable!("system messages are handled before mapping"),
    }
}

pub fn from_api_response(json: &Value) -> Result<ChatResponse, ProviderError> {
    let message = &json["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for (i, call) in calls.iter().enumerate() {
            tool_calls.push(ToolCall {
                id: format!("call_{i}"),
                name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                arguments: call["function"]["arguments"].clone(),
            });
        }
    }

    let finish_reason =
        if !tool_calls.is_empty() { FinishReason::ToolUse } else { FinishReason::EndTurn };
    let usage = TokenUsage {
        input_tokens: json["prompt_eval_count"].as_u64().unwrap_or(0),
        output_tokens: json["eval_count"].as_u64().unwrap_or(0),
    };

    Ok(ChatResponse { content, tool_calls, finish_reason, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_arguments_stay_structured() {
        let call =
            tiny_agent_types::types::ToolCall { id: "c1".into(), name: "grep".into(), arguments: json!({"pattern": "x"}) };
        let msg = Message::assistant("", vec![call]);
        let opts = ChatOptions { model: "llama3.1".into(), messages: vec![msg], ..Default::default() };
        let body = to_api_request(&opts, "llama3.1");
        assert_eq!(body["messages"][0]["tool_calls"][0]["function"]["arguments"], json!({"pattern": "x"}));
    }

    #[test]
    fn parses_tool_call_response() {
        let resp = json!({
            "message": {"content": "", "tool_calls": [{"function": {"name": "grep", "arguments": {"pattern": "x"}}}]},
            "prompt_eval_count": 5, "eval_count": 2,
        });
        let parsed = from_api_response(&resp).unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.finish_reason, FinishReason::ToolUse);
    }
}
