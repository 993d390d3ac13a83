//! The `bash` tool: spawns a shell command with the filtered subprocess
//! environment, a 60s default timeout, and confirmation gating driven by
//! the Destructive-Command / Read-Only-Command lists (spec §4.12, §6).
//! Grounded on `elisplash-paw`'s `exec` tool (`tokio::process::Command`
//! with `kill_on_drop`, `tokio::time::timeout` around `wait_with_output`,
//! stdout/stderr concatenation with an `--- stderr ---` separator).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tiny_agent_tool::Tool;
use tiny_agent_types::ToolResult;

use crate::security;

/// Default execution timeout (spec §5).
pub const DEFAULT_BASH_TIMEOUT: Duration = Duration::from_secs(60);

/// Output is truncated beyond this many characters, mirroring the
/// teacher's `exec` tool's own 50_000-char cap.
const MAX_OUTPUT_CHARS: usize = 50_000;

pub struct BashTool {
    timeout: Duration,
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl BashTool {
    #[must_use]
    pub fn new() -> Self {
        Self { timeout: DEFAULT_BASH_TIMEOUT }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout/stderr. Runs with a filtered environment and a timeout."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"}
            },
            "required": ["command"]
        })
    }

    fn dangerous(&self, args: &serde_json::Value) -> Option<String> {
        let command = args.get("command").and_then(serde_json::Value::as_str)?;
        if security::is_destructive_command(command) {
            Some(format!("Run potentially destructive command: {command}"))
        } else {
            None
        }
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(command) = args.get("command").and_then(serde_json::Value::as_str) else {
            return ToolResult::err("missing required string argument \"command\"");
        };

        tracing::debug!(command, "bash tool invocation");

        let mut builder = tokio::process::Command::new("sh");
        builder.arg("-c").arg(command);
        builder.env_clear();
        builder.envs(tiny_agent_mcp::filtered_env());
        builder.stdout(std::process::Stdio::piped());
        builder.stderr(std::process::Stdio::piped());

        let mut child = match builder.spawn() {
            Ok(child) => child,
            Err(e) => return ToolResult::err(format!("failed to spawn shell: {e}")),
        };
        child.kill_on_drop(true);

        let outcome = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::err(format!("command failed: {e}")),
            Err(_) => {
                return ToolResult::err(format!("command timed out after {:?}", self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push_str("\n--- stderr ---\n");
            }
            result.push_str(&stderr);
        }
        if result.is_empty() {
            result = format!("(exit code: {})", output.status.code().unwrap_or(-1));
        }

        if result.chars().count() > MAX_OUTPUT_CHARS {
            let truncated: String = result.chars().take(MAX_OUTPUT_CHARS).collect();
            result = format!("{truncated}\n\n... [output truncated]");
        }

        if output.status.success() {
            ToolResult::ok(result)
        } else {
            ToolResult::err(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_simple_command() {
        let bash = BashTool::new();
        let result = bash.execute(json!({"command": "echo hello"})).await;
        assert!(result.success);
        assert_eq!(result.output.unwrap().trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_failure() {
        let bash = BashTool::new();
        let result = bash.execute(json!({"command": "exit 3"})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn times_out_long_running_command() {
        let bash = BashTool::with_timeout(Duration::from_millis(50));
        let result = bash.execute(json!({"command": "sleep 5"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn read_only_commands_are_not_dangerous() {
        let bash = BashTool::new();
        assert!(bash.dangerous(&json!({"command": "git status"})).is_none());
        assert!(bash.dangerous(&json!({"command": "ls -la"})).is_none());
    }

    #[test]
    fn destructive_commands_are_dangerous() {
        let bash = BashTool::new();
        assert!(bash.dangerous(&json!({"command": "rm -rf /tmp/x"})).is_some());
        assert!(bash.dangerous(&json!({"command": "git push origin main"})).is_some());
    }
}
