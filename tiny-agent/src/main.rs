//! Thin binary entrypoint; all logic lives in `tiny_agent_cli` so it can be
//! exercised from integration tests without spawning a process.

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let code = tiny_agent_cli::run().await;
    std::process::ExitCode::from(code as u8)
}
