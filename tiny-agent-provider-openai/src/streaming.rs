//! SSE streaming for the OpenAI Chat Completions API. The wire shape is
//! `data: <json>\n\n` lines terminated by a literal `data: [DONE]`.

use futures::{Stream, StreamExt};
use reqwest::Response;
use std::collections::HashMap;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{StreamChunk, TokenUsage, ToolCallPartial};

use crate::mapping::map_finish_reason;

pub fn stream_completion(
    response: Response,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    parse_sse_stream(response.bytes_stream())
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    async_stream::stream! {
        let mut names: HashMap<usize, String> = HashMap::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut line_buf = String::new();

        'outer: while let Some(chunk) = bytes_stream.next().await {
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
                let line = line_buf[..pos].trim_end_matches('\r').to_string();
                line_buf.drain(..=pos);

                let Some(data) = line.strip_prefix("data:") else { continue };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    yield Ok(StreamChunk { done: true, ..Default::default() });
                    break 'outer;
                }

                let value: serde_json::Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(ProviderError::StreamError(format!("bad SSE payload: {e}")));
                        break 'outer;
                    }
                };

                let delta = &value["choices"][0]["delta"];
                let mut chunk_out = StreamChunk::default();

                if let Some(text) = delta["content"].as_str() {
                    chunk_out.content = Some(text.to_string());
                }
                if let Some(calls) = delta["tool_calls"].as_array() {
                    for call in calls {
                        let index = call["index"].as_u64().unwrap_or(0) as usize;
                        let id = call["id"].as_str().map(String::from);
                        let name = call["function"]["name"].as_str().map(String::from);
                        if let Some(n) = &name {
                            names.insert(index, n.clone());
                        }
                        let arguments_delta = call["function"]["arguments"].as_str().map(String::from);
                        chunk_out.tool_calls.push(ToolCallPartial { index, id, name, arguments_delta });
                    }
                }
                if let Some(reason) = value["choices"][0]["finish_reason"].as_str() {
                    chunk_out.finish_reason = Some(map_finish_reason(reason));
                }
                if let Some(usage) = value["usage"].as_object() {
                    if !usage.is_empty() {
                        chunk_out.usage = Some(TokenUsage {
                            input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
                            output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
                        });
                    }
                }
                yield Ok(chunk_out);
            }
        }
    }
}
