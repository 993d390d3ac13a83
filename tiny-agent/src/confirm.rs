//! Interactive `y/n` confirmation handler for dangerous tool calls,
//! installed into the [`ConfirmationBroker`] unless `--allow-all` is set
//! (in which case the broker's own `approve_all` toggle short-circuits it
//! and this handler is never consulted).

use tiny_agent_confirm::{ConfirmationHandler, ConfirmationRequest, ConfirmationResult};

/// Prompts on stdout and reads a line from stdin per confirmation batch.
pub struct TerminalConfirmationHandler;

#[async_trait::async_trait]
impl ConfirmationHandler for TerminalConfirmationHandler {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResult {
        println!();
        for action in &request.actions {
            println!("  {} — {}", action.tool, action.description);
        }
        print!("Allow? [y]es / [n]o / [a]lways for this session: ");
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin().read_line(&mut buf).ok();
            buf
        })
        .await
        .unwrap_or_default();

        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => ConfirmationResult::Approve,
            "a" | "always" => ConfirmationResult::Approve,
            _ => ConfirmationResult::Deny,
        }
    }
}
