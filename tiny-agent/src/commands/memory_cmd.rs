//! `memory [list|add|clear|stats]` subcommands.

use tiny_agent_types::MemoryCategory;

use crate::cli::MemoryAction;
use crate::setup::Session;

pub async fn run(session: &Session, action: MemoryAction) -> i32 {
    match action {
        MemoryAction::List => {
            let memories = session.memories.list().await;
            if memories.is_empty() {
                println!("(no memories stored)");
            }
            for memory in memories {
                println!("[{:?}] {} — {}", memory.category, memory.id, memory.content);
            }
            0
        }
        MemoryAction::Add { content, category } => {
            let Some(category) = parse_category(&category) else {
                eprintln!("error: unknown category {category} (expected user, project, or codebase)");
                return 1;
            };
            let memory = session.memories.add(content, category).await;
            if let Err(e) = session.memories.flush().await {
                tracing::warn!(error = %e, "failed to persist memory");
            }
            println!("added {}", memory.id);
            0
        }
        MemoryAction::Clear => {
            session.memories.clear().await;
            if let Err(e) = session.memories.flush().await {
                tracing::warn!(error = %e, "failed to persist memory");
            }
            println!("cleared");
            0
        }
        MemoryAction::Stats => {
            let memories = session.memories.list().await;
            let tokens = session.memories.count_tokens().await;
            println!("{} memories, ~{tokens} tokens", memories.len());
            0
        }
    }
}

fn parse_category(s: &str) -> Option<MemoryCategory> {
    match s.to_lowercase().as_str() {
        "user" => Some(MemoryCategory::User),
        "project" => Some(MemoryCategory::Project),
        "codebase" => Some(MemoryCategory::Codebase),
        _ => None,
    }
}
