//! NDJSON streaming for Ollama's native `/api/chat` endpoint: each line is a
//! complete JSON object, not an SSE delta. Tool calls arrive fully formed on
//! the final (`done: true`) line rather than incrementally, so each is
//! emitted as a single-shot [`ToolCallPartial`] with the whole arguments
//! object serialized into `arguments_delta` in one piece.

use futures::{Stream, StreamExt};
use reqwest::Response;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{FinishReason, StreamChunk, TokenUsage, ToolCallPartial};

pub fn stream_completion(
    response: Response,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    parse_ndjson_stream(response.bytes_stream())
}

fn parse_ndjson_stream(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    async_stream::stream! {
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut line_buf = String::new();

        while let Some(chunk) = bytes_stream.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(ProviderError::StreamError(e.to_string()));
                    return;
                }
            };
            let text = match std::str::from_utf8(&chunk) {
                Ok(s) => s,
                Err(e) => {
                    yield Err(ProviderError::StreamError(format!("invalid utf-8: {e}")));
                    return;
                }
            };
            line_buf.push_str(text);

            while let Some(pos) = line_buf.find('\n') {
                let line = line_buf[..pos].to_string();
                line_buf.drain(..=pos);
                if line.trim().is_empty() {
                    continue;
                }

                let value: serde_json::Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(ProviderError::StreamError(format!("bad NDJSON line: {e}")));
                        return;
                    }
                };

                if let Some(err) = value["error"].as_str() {
                    yield Err(ProviderError::Other { status: 0, body: err.to_string() });
                    return;
                }

                let mut out = StreamChunk::default();
                if let Some(text) = value["message"]["content"].as_str() {
                    if !text.is_empty() {
                        out.content = Some(text.to_string());
                    }
                }
                if let Some(calls) = value["message"]["tool_calls"].as_array() {
                    for (i, call) in calls.iter().enumerate() {
                        out.tool_calls.push(ToolCallPartial {
                            index: i,
                            id: Some(format!("call_{i}")),
                            name: call["function"]["name"].as_str().map(String::from),
                            arguments_delta: Some(call["function"]["arguments"].to_string()),
                        });
                    }
                }
                if value["done"].as_bool().unwrap_or(false) {
                    out.done = true;
                    out.finish_reason = Some(if out.tool_calls.is_empty() {
                        FinishReason::EndTurn
                    } else {
                        FinishReason::ToolUse
                    });
                    out.usage = Some(TokenUsage {
                        input_tokens: value["prompt_eval_count"].as_u64().unwrap_or(0),
                        output_tokens: value["eval_count"].as_u64().unwrap_or(0),
                    });
                }
                yield Ok(out);
            }
        }
    }
}
