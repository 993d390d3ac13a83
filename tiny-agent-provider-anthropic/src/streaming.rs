//! SSE streaming for the Anthropic Messages API.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages-streaming>. Parses
//! `event:`/`data:` line pairs off the response body and maps them to
//! [`StreamChunk`]s, accumulating one [`ToolCallPartial`] per content-block
//! index as `input_json_delta` fragments arrive.

use futures::{Stream, StreamExt};
use reqwest::Response;
use std::collections::HashMap;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::types::{FinishReason, StreamChunk, TokenUsage, ToolCallPartial};

use crate::mapping::map_stop_reason;

pub fn stream_completion(
    response: Response,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    let byte_stream = response.bytes_stream();
    parse_sse_stream(byte_stream)
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    async_stream::stream! {
        let mut state = ParserState::default();
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut line_buf = String::new();
        let mut current_event = String::new();
        let mut current_data = String::new();

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

                if line.is_empty() {
                    if !current_data.is_empty() {
                        match state.handle_event(&current_event, &current_data) {
                            Ok(Some(out)) => yield Ok(out),
                            Ok(None) => {}
                            Err(e) => {
                                yield Err(e);
                                break 'outer;
                            }
                        }
                    }
                    current_event.clear();
                    current_data.clear();
                    continue;
                }
                if let Some(rest) = line.strip_prefix("event:") {
                    current_event = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    current_data.push_str(rest.trim());
                }
            }
        }
    }
}

#[derive(Default)]
struct ParserState {
    tool_calls: HashMap<usize, ToolCallPartial>,
}

impl ParserState {
    fn handle_event(
        &mut self,
        event: &str,
        data: &str,
    ) -> Result<Option<StreamChunk>, ProviderError> {
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| ProviderError::StreamError(format!("bad SSE payload: {e}")))?;

        match event {
            "content_block_start" => {
                let index = value["index"].as_u64().unwrap_or(0) as usize;
                if value["content_block"]["type"] == "tool_use" {
                    self.tool_calls.insert(
                        index,
                        ToolCallPartial {
                            index,
                            id: value["content_block"]["id"].as_str().map(String::from),
                            name: value["content_block"]["name"].as_str().map(String::from),
                            arguments_delta: Some(String::new()),
                        },
                    );
                }
                Ok(None)
            }
            "content_block_delta" => {
                let index = value["index"].as_u64().unwrap_or(0) as usize;
                match value["delta"]["type"].as_str() {
                    Some("text_delta") => Ok(Some(StreamChunk {
                        content: Some(value["delta"]["text"].as_str().unwrap_or_default().into()),
                        done: false,
                        ..Default::default()
                    })),
                    Some("input_json_delta") => {
                        let frag = value["delta"]["partial_json"].as_str().unwrap_or_default();
                        let entry = self.tool_calls.entry(index).or_insert_with(|| {
                            ToolCallPartial { index, arguments_delta: Some(String::new()), ..Default::default() }
                        });
                        Ok(Some(StreamChunk {
                            tool_calls: vec![ToolCallPartial {
                                index,
                                id: entry.id.clone(),
                                name: entry.name.clone(),
                                arguments_delta: Some(frag.to_string()),
                            }],
                            done: false,
                            ..Default::default()
                        }))
                    }
                    _ => Ok(None),
                }
            }
            "message_delta" => {
                let stop_reason = value["delta"]["stop_reason"].as_str();
                let usage = value["usage"].as_object().map(|_| TokenUsage {
                    input_tokens: value["usage"]["input_tokens"].as_u64().unwrap_or(0),
                    output_tokens: value["usage"]["output_tokens"].as_u64().unwrap_or(0),
                });
                Ok(Some(StreamChunk {
                    done: false,
                    usage,
                    finish_reason: stop_reason.map(map_stop_reason),
                    ..Default::default()
                }))
            }
            "message_stop" => Ok(Some(StreamChunk {
                done: true,
                finish_reason: Some(FinishReason::EndTurn),
                ..Default::default()
            })),
            "error" => Err(ProviderError::StreamError(
                value["error"]["message"].as_str().unwrap_or("unknown stream error").to_string(),
            )),
            _ => Ok(None),
        }
    }
}
