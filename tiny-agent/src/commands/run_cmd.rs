//! Single-shot `run <prompt>` subcommand; falls back to stdin when no
//! prompt argument is given and stdin is piped (spec §6).

use std::io::IsTerminal;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::output::{self, RenderOptions};
use crate::setup::Session;

pub async fn run(session: &Session, cli: &Cli, prompt: Option<String>) -> i32 {
    let prompt = match prompt {
        Some(p) => p,
        None => match read_stdin_prompt() {
            Some(p) => p,
            None => {
                eprintln!("error: no prompt given and stdin is not piped");
                return 1;
            }
        },
    };

    let opts = RenderOptions {
        json: cli.json,
        no_status: cli.no_status,
        no_color: cli.no_color,
    };

    let cancel = CancellationToken::new();
    let cancel_on_sigint = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_sigint.cancel();
        }
    });

    let stream = session.agent.clone().run(prompt, session.model.clone(), cancel).boxed();
    let max_iterations_reached = output::render(stream, &opts).await;
    ctrl_c.abort();
    if !cli.json {
        println!();
    }

    if cli.save {
        if let Err(e) = session.conversation.flush().await {
            tracing::warn!(error = %e, "failed to flush conversation");
        }
    }
    if let Err(e) = session.memories.flush().await {
        tracing::warn!(error = %e, "failed to flush memory store");
    }

    if max_iterations_reached {
        1
    } else {
        0
    }
}

fn read_stdin_prompt() -> Option<String> {
    if std::io::stdin().is_terminal() {
        return None;
    }
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).ok()?;
    let buf = buf.trim().to_string();
    if buf.is_empty() {
        None
    } else {
        Some(buf)
    }
}
