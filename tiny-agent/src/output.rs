//! Renders the Agent Loop's [`AgentChunk`] stream to the terminal, either
//! as human-readable text or as the spec's `--json` line protocol (§6:
//! `{type: "user"|"assistant"|"tool", content, toolName?}`).

use futures::StreamExt;
use serde::Serialize;
use tiny_agent_types::{AgentChunk, ToolExecutionStatus};

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
    #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

/// Options controlling how a turn's chunk stream is rendered.
pub struct RenderOptions {
    pub json: bool,
    pub no_status: bool,
    pub no_color: bool,
}

/// Drains `stream`, printing each chunk per `opts`. Returns whether the
/// turn finished by hitting `maxIterations`.
pub async fn render(
    mut stream: std::pin::Pin<Box<dyn futures::Stream<Item = AgentChunk> + Send>>,
    opts: &RenderOptions,
) -> bool {
    let mut max_iterations_reached = false;
    while let Some(chunk) = stream.next().await {
        if let Some(content) = &chunk.content {
            emit(opts, "assistant", content, None);
        }
        for execution in &chunk.tool_executions {
            match execution.status {
                ToolExecutionStatus::Running => {
                    if !opts.no_status {
                        emit_status(opts, &format!("→ {}", execution.name));
                    }
                }
                ToolExecutionStatus::Complete => {
                    let text = execution.output.as_deref().unwrap_or_default();
                    emit(opts, "tool", text, Some(&execution.name));
                }
                ToolExecutionStatus::Error => {
                    let text = execution.error.as_deref().unwrap_or("tool failed");
                    emit(opts, "tool", text, Some(&execution.name));
                }
            }
        }
        if !opts.no_status {
            if let Some(stats) = &chunk.context_stats {
                emit_status(
                    opts,
                    &format!(
                        "  [iteration {} · {}/{} tokens]",
                        chunk.iterations, stats.total_tokens, stats.max_context_tokens
                    ),
                );
            }
        }
        if chunk.done {
            max_iterations_reached = chunk.max_iterations_reached.unwrap_or(false);
        }
    }
    max_iterations_reached
}

fn emit(opts: &RenderOptions, kind: &str, content: &str, tool_name: Option<&str>) {
    if content.is_empty() && tool_name.is_none() {
        return;
    }
    if opts.json {
        let line = JsonLine { kind, content, tool_name };
        println!("{}", serde_json::to_string(&line).unwrap_or_default());
        return;
    }
    match (kind, opts.no_color) {
        ("assistant", _) => print!("{content}"),
        ("tool", true) => println!("[{}] {content}", tool_name.unwrap_or("tool")),
        ("tool", false) => println!("\x1b[2m[{}]\x1b[0m {content}", tool_name.unwrap_or("tool")),
        _ => println!("{content}"),
    }
}

fn emit_status(opts: &RenderOptions, line: &str) {
    if opts.json {
        return;
    }
    if opts.no_color {
        eprintln!("{line}");
    } else {
        eprintln!("\x1b[2m{line}\x1b[0m");
    }
}
