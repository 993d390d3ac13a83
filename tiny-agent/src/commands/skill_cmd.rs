//! `skill [list|show|init]` subcommands.

use crate::cli::SkillAction;
use crate::setup::Session;

const SKILL_TEMPLATE: &str = "---\nname: %NAME%\ndescription: TODO one-line description\n---\n\n\
# %TITLE%\n\nTODO: describe what this skill should do.\n";

pub async fn run(session: &Session, action: SkillAction) -> i32 {
    match action {
        SkillAction::List => {
            for skill in session.skills.list() {
                let builtin = if skill.is_builtin { " (builtin)" } else { "" };
                println!("{}{} — {}", skill.name, builtin, skill.description);
            }
            0
        }
        SkillAction::Show { name } => {
            let Some(skill) = session.skills.get(&name) else {
                eprintln!("error: no such skill: {name}");
                return 1;
            };
            match session.skills.load_content(&skill).await {
                Ok(body) => {
                    println!("{body}");
                    0
                }
                Err(e) => {
                    eprintln!("error: failed to load skill {name}: {e}");
                    1
                }
            }
        }
        SkillAction::Init { name } => init(&name).await,
    }
}

async fn init(name: &str) -> i32 {
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        eprintln!("error: skill name must match ^[a-z0-9]+(-[a-z0-9]+)*$");
        return 1;
    }
    let dir = std::path::PathBuf::from(".tiny-agent-skills").join(name);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        eprintln!("error: failed to create {}: {e}", dir.display());
        return 1;
    }
    let path = dir.join("SKILL.md");
    let title = name.replace('-', " ");
    let content = SKILL_TEMPLATE.replace("%NAME%", name).replace("%TITLE%", &title);
    if let Err(e) = tokio::fs::write(&path, content).await {
        eprintln!("error: failed to write {}: {e}", path.display());
        return 1;
    }
    println!("created {}", path.display());
    0
}
