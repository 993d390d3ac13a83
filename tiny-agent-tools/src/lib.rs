//! Built-in tools registered with every agent (spec §4.12): filesystem,
//! shell, text search, web search, and skill loading, each implementing
//! [`tiny_agent_tool::Tool`]. Security gates (sensitive-file patterns,
//! protected paths, destructive/read-only command lists) live in
//! [`security`] and are shared by [`bash`] and [`fs_tools`].

pub mod bash;
pub mod fs_tools;
pub mod search_tools;
pub mod security;
pub mod skill_tool;
pub mod web_search;

pub use bash::BashTool;
pub use fs_tools::{EditFileTool, ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use search_tools::{GlobTool, GrepTool};
pub use skill_tool::{OnSkillLoad, SkillTool};
pub use web_search::WebSearchTool;

use std::sync::Arc;

use tiny_agent_search::SearchProvider;
use tiny_agent_skill::SkillRegistry;
use tiny_agent_tool::{Tool, ToolRegistry};

/// Registers the filesystem and shell tools (`read_file`, `write_file`,
/// `edit_file`, `list_directory`, `grep`, `glob`, `bash`) that every
/// agent gets regardless of configuration. `web_search` and `skill` are
/// registered separately since they need a provider/registry supplied
/// by the caller.
pub fn register_core_tools(registry: &ToolRegistry) -> Result<(), tiny_agent_types::ToolError> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool),
        Arc::new(WriteFileTool),
        Arc::new(EditFileTool),
        Arc::new(ListDirectoryTool),
        Arc::new(GrepTool),
        Arc::new(GlobTool),
        Arc::new(BashTool::new()),
    ];
    for tool in tools {
        registry.register(tool)?;
    }
    Ok(())
}

/// Registers `web_search` against the given backend.
pub fn register_web_search(
    registry: &ToolRegistry,
    provider: Arc<dyn SearchProvider>,
) -> Result<(), tiny_agent_types::ToolError> {
    registry.register(Arc::new(WebSearchTool::new(provider)))
}

/// Registers `skill`, wiring its on-load callback to restrict (or clear
/// the restriction on) `registry` itself.
pub fn register_skill_tool(
    registry: &Arc<ToolRegistry>,
    skills: Arc<SkillRegistry>,
) -> Result<(), tiny_agent_types::ToolError> {
    let target = Arc::clone(registry);
    let on_load: OnSkillLoad = Arc::new(move |allowed| target.set_restriction(allowed));
    registry.register(Arc::new(SkillTool::new(skills, on_load)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_tools_register_without_conflict() {
        let registry = ToolRegistry::new();
        register_core_tools(&registry).unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        for expected in ["read_file", "write_file", "edit_file", "list_directory", "grep", "glob", "bash"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn skill_tool_restriction_round_trips_through_registry() {
        let registry = Arc::new(ToolRegistry::new());
        register_core_tools(&registry).unwrap();
        register_skill_tool(&registry, Arc::new(SkillRegistry::new())).unwrap();
        assert!(registry.get("skill").is_some());
    }
}
