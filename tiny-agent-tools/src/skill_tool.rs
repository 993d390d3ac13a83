//! The `skill` tool — loads a discovered or builtin skill's body into
//! context and applies its `allowedTools` restriction, if any.
//!
//! Per SPEC_FULL.md §9's cyclic-reference note, this tool does not hold
//! the full `ToolRegistry` (which would create a Skill → Tool →
//! ToolRegistry → Skill cycle). Instead the Agent Loop supplies an
//! `on_load` callback at construction time that it alone knows how to
//! wire to `ToolRegistry::set_restriction`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tiny_agent_skill::SkillRegistry;
use tiny_agent_tool::Tool;
use tiny_agent_types::ToolResult;

/// Invoked after a skill's content has been loaded, with its
/// `allowedTools` (or `None` if it does not restrict the tool set).
pub type OnSkillLoad = Arc<dyn Fn(Option<Vec<String>>) + Send + Sync>;

pub struct SkillTool {
    registry: Arc<SkillRegistry>,
    on_load: OnSkillLoad,
}

impl SkillTool {
    #[must_use]
    pub fn new(registry: Arc<SkillRegistry>, on_load: OnSkillLoad) -> Self {
        Self { registry, on_load }
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        "skill"
    }

    fn description(&self) -> &str {
        "Load a named skill's instructions into context. May restrict the tool set to that skill's allowedTools until the next user turn."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Name of the skill to load"}
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(name) = args.get("name").and_then(serde_json::Value::as_str) else {
            return ToolResult::err("missing required string argument \"name\"");
        };

        let Some(skill) = self.registry.get(name) else {
            return ToolResult::err(format!("skill \"{name}\" not found"));
        };

        match self.registry.load_content(&skill).await {
            Ok(content) => {
                (self.on_load)(skill.allowed_tools.clone());
                ToolResult::ok(content)
            }
            Err(e) => ToolResult::err(format!("failed to load skill \"{name}\": {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn loads_builtin_skill_and_fires_callback() {
        let registry = Arc::new(SkillRegistry::new());
        let seen: Arc<Mutex<Option<Option<Vec<String>>>>> = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let tool = SkillTool::new(registry, Arc::new(move |allowed| {
            *seen_clone.lock().unwrap() = Some(allowed);
        }));

        let result = tool.execute(json!({"name": "commit"})).await;
        assert!(result.success);
        assert!(result.output.unwrap().contains("<loaded_skill"));
        assert_eq!(seen.lock().unwrap().clone().unwrap(), Some(vec!["bash".to_string(), "read_file".to_string()]));
    }

    #[tokio::test]
    async fn unknown_skill_errors() {
        let registry = Arc::new(SkillRegistry::new());
        let tool = SkillTool::new(registry, Arc::new(|_| {}));
        let result = tool.execute(json!({"name": "does-not-exist"})).await;
        assert!(!result.success);
    }
}
