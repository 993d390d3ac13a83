//! Interactive chat loop (the `chat` subcommand, and the default when no
//! subcommand is given).

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::output::{self, RenderOptions};
use crate::setup::Session;

/// Runs turns read from stdin until EOF (Ctrl-D) or an interrupt.
pub async fn run(session: &Session, cli: &Cli) -> i32 {
    let opts = RenderOptions {
        json: cli.json,
        no_status: cli.no_status,
        no_color: cli.no_color,
    };

    if !cli.json {
        println!("tiny-agent — model {}. Ctrl-D to exit.", session.model);
    }

    loop {
        if !cli.json {
            print!("> ");
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }

        let line = read_line().await;
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cancel = CancellationToken::new();
        let cancel_on_sigint = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_on_sigint.cancel();
            }
        });

        let stream = session
            .agent
            .clone()
            .run(line.to_string(), session.model.clone(), cancel)
            .boxed();
        let max_iterations_reached = output::render(stream, &opts).await;
        ctrl_c.abort();
        if !cli.json {
            println!();
            if max_iterations_reached {
                eprintln!("(stopped: max iterations reached)");
            }
        }
    }

    if cli.save {
        if let Err(e) = session.conversation.flush().await {
            tracing::warn!(error = %e, "failed to flush conversation");
        }
    }
    if let Err(e) = session.memories.flush().await {
        tracing::warn!(error = %e, "failed to flush memory store");
    }

    0
}

async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        match std::io::stdin().read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}
