//! `config` / `config open` subcommands.

use crate::cli::ConfigAction;
use crate::config::{default_config_path, Config};

pub async fn run(action: Option<ConfigAction>, config: &Config) -> i32 {
    match action {
        None => {
            match serde_yaml::to_string(config) {
                Ok(yaml) => print!("{yaml}"),
                Err(e) => {
                    eprintln!("error: failed to render config: {e}");
                    return 1;
                }
            }
            0
        }
        Some(ConfigAction::Open) => open_in_editor().await,
    }
}

async fn open_in_editor() -> i32 {
    let Some(path) = default_config_path() else {
        eprintln!("error: cannot resolve config path ($HOME not set)");
        return 1;
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            eprintln!("error: failed to create {}: {e}", parent.display());
            return 1;
        }
    }
    if tokio::fs::metadata(&path).await.is_err() {
        if let Err(e) = tokio::fs::write(&path, "").await {
            eprintln!("error: failed to create {}: {e}", path.display());
            return 1;
        }
    }

    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());

    match tokio::process::Command::new(&editor).arg(&path).status().await {
        Ok(status) if status.success() => 0,
        Ok(status) => status.code().unwrap_or(1),
        Err(e) => {
            eprintln!("error: failed to launch {editor}: {e}");
            1
        }
    }
}
