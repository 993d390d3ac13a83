//! `read_file`, `write_file`, `edit_file`, `list_directory` — the file
//! surface of the built-in tool set (spec §4.12). Write/edit tools run
//! every candidate path through [`security::is_protected_path`] and
//! [`security::is_sensitive_file`] before touching the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tiny_agent_tool::Tool;
use tiny_agent_types::ToolResult;

use crate::security;

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn reject_if_protected(path: &Path) -> Option<ToolResult> {
    let cwd = cwd();
    let home = home_dir();
    if security::is_protected_path(path, &cwd, home.as_deref()) {
        return Some(ToolResult::err(format!(
            "refusing to write under a protected or sensitive path: {}",
            path.display()
        )));
    }
    if security::is_sensitive_file(path) {
        return Some(ToolResult::err(format!(
            "refusing to write a sensitive file: {}",
            path.display()
        )));
    }
    None
}

fn arg_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolResult> {
    args.get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ToolResult::err(format!("missing required string argument \"{key}\"")))
}

/// Reads a UTF-8 text file in full.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file at the given path."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to read"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = match arg_str(&args, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        match tokio::fs::read_to_string(path).await {
            Ok(content) => ToolResult::ok(content),
            Err(e) => ToolResult::err(format!("failed to read {path}: {e}")),
        }
    }
}

/// Overwrites (or creates) a text file with the given content.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it does not exist and overwriting it otherwise."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to write"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["path", "content"]
        })
    }

    fn dangerous(&self, _args: &serde_json::Value) -> Option<String> {
        Some(tiny_agent_tool::default_dangerous_message("write_file"))
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = match arg_str(&args, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let content = match arg_str(&args, "content") {
            Ok(c) => c,
            Err(e) => return e,
        };

        if let Some(refused) = reject_if_protected(Path::new(path)) {
            return refused;
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolResult::err(format!("failed to create directory {}: {e}", parent.display()));
                }
            }
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => ToolResult::ok(format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolResult::err(format!("failed to write {path}: {e}")),
        }
    }
}

/// Replaces the first occurrence of `old_text` with `new_text` in a file.
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact text match in a file with new text. Fails if the match is not found or is not unique."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to edit"},
                "old_text": {"type": "string", "description": "Exact text to replace"},
                "new_text": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    fn dangerous(&self, _args: &serde_json::Value) -> Option<String> {
        Some(tiny_agent_tool::default_dangerous_message("edit_file"))
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = match arg_str(&args, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let old_text = match arg_str(&args, "old_text") {
            Ok(t) => t,
            Err(e) => return e,
        };
        let new_text = match arg_str(&args, "new_text") {
            Ok(t) => t,
            Err(e) => return e,
        };

        if let Some(refused) = reject_if_protected(Path::new(path)) {
            return refused;
        }

        let current = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("failed to read {path}: {e}")),
        };

        let occurrences = current.matches(old_text).count();
        if occurrences == 0 {
            return ToolResult::err(format!("old_text not found in {path}"));
        }
        if occurrences > 1 {
            return ToolResult::err(format!(
                "old_text matches {occurrences} locations in {path}; must be unique"
            ));
        }

        let updated = current.replacen(old_text, new_text, 1);
        match tokio::fs::write(path, updated).await {
            Ok(()) => ToolResult::ok(format!("edited {path}")),
            Err(e) => ToolResult::err(format!("failed to write {path}: {e}")),
        }
    }
}

/// Lists the immediate entries of a directory.
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and subdirectories directly inside a directory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path = match arg_str(&args, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(e) => e,
            Err(e) => return ToolResult::err(format!("failed to list {path}: {e}")),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    let name = entry.file_name().to_string_lossy().into_owned();
                    names.push(if is_dir { format!("{name}/") } else { name });
                }
                Ok(None) => break,
                Err(e) => return ToolResult::err(format!("failed to list {path}: {e}")),
            }
        }
        names.sort();
        ToolResult::ok(names.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let write = WriteFileTool;
        let result = write
            .execute(json!({"path": path.to_string_lossy(), "content": "hello"}))
            .await;
        assert!(result.success, "{:?}", result.error);

        let read = ReadFileTool;
        let result = read.execute(json!({"path": path.to_string_lossy()})).await;
        assert_eq!(result.output.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn write_refuses_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let write = WriteFileTool;
        let result = write.execute(json!({"path": path.to_string_lossy(), "content": "X"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("sensitive"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_refuses_parent_traversal() {
        let write = WriteFileTool;
        let result = write
            .execute(json!({"path": "../../etc/passwd", "content": "X"}))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn write_is_dangerous() {
        let write = WriteFileTool;
        assert!(write.dangerous(&json!({})).is_some());
    }

    #[tokio::test]
    async fn edit_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "foo foo").await.unwrap();
        let edit = EditFileTool;
        let result = edit
            .execute(json!({"path": path.to_string_lossy(), "old_text": "foo", "new_text": "bar"}))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("2 locations"));
    }

    #[tokio::test]
    async fn edit_replaces_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "hello world").await.unwrap();
        let edit = EditFileTool;
        let result = edit
            .execute(json!({"path": path.to_string_lossy(), "old_text": "world", "new_text": "rust"}))
            .await;
        assert!(result.success);
        let updated = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(updated, "hello rust");
    }

    #[tokio::test]
    async fn list_directory_sorts_and_marks_dirs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
        tokio::fs::create_dir(dir.path().join("a_dir")).await.unwrap();
        let list = ListDirectoryTool;
        let result = list.execute(json!({"path": dir.path().to_string_lossy()})).await;
        assert_eq!(result.output.as_deref(), Some("a_dir/\nb.txt"));
    }
}
