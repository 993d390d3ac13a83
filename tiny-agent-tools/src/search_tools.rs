//! `grep` and `glob` — read-only filesystem search tools.
//!
//! Grounded on `examples/hi-youichi-loom/loom`'s file tools: `glob` walks
//! with `walkdir` and matches with `glob::Pattern`
//! (`loom/src/tools/file/glob.rs`), `grep` searches file contents with the
//! ripgrep library stack (`ignore` + `grep-regex` + `grep-searcher`), per
//! `loom/Cargo.toml`'s "Grep tool: ripgrep library stack" dependency block.
//! Both walks are blocking, so each runs inside `spawn_blocking` rather than
//! blocking the async runtime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use ignore::WalkBuilder;
use serde_json::json;
use tiny_agent_tool::Tool;
use tiny_agent_types::ToolResult;

/// Maximum number of matches either tool returns, to keep tool output
/// bounded regardless of repository size.
const MAX_RESULTS: usize = 200;

/// Recursively searches file contents for a regular expression.
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents under a directory for a regular expression pattern, returning matching lines."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regular expression to search for"},
                "path": {"type": "string", "description": "Directory to search (default: current directory)"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(serde_json::Value::as_str) else {
            return ToolResult::err("missing required string argument \"pattern\"");
        };
        let pattern = pattern.to_string();
        let root = args
            .get("path")
            .and_then(serde_json::Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        match tokio::task::spawn_blocking(move || grep_dir(&root, &pattern)).await {
            Ok(Ok(matches)) if matches.is_empty() => ToolResult::ok("no matches"),
            Ok(Ok(matches)) => ToolResult::ok(matches.join("\n")),
            Ok(Err(e)) => ToolResult::err(e),
            Err(e) => ToolResult::err(format!("grep task panicked: {e}")),
        }
    }
}

fn grep_dir(root: &Path, pattern: &str) -> Result<Vec<String>, String> {
    let matcher = RegexMatcher::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;
    let mut matches = Vec::new();

    'walk: for entry in WalkBuilder::new(root).hidden(false).build() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let mut searcher = Searcher::new();
        let search_result = searcher.search_path(
            &matcher,
            path,
            UTF8(|lineno, line| {
                matches.push(format!("{}:{}:{}", path.display(), lineno, line.trim_end()));
                Ok(matches.len() < MAX_RESULTS)
            }),
        );
        if search_result.is_err() {
            continue;
        }
        if matches.len() >= MAX_RESULTS {
            break 'walk;
        }
    }

    Ok(matches)
}

/// Finds files whose path matches a glob pattern.
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files under a directory whose path matches a glob pattern (supports *, **, ?)."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern, e.g. \"**/*.rs\""},
                "path": {"type": "string", "description": "Directory to search (default: current directory)"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(serde_json::Value::as_str) else {
            return ToolResult::err("missing required string argument \"pattern\"");
        };
        let pattern = pattern.to_string();
        let root = args
            .get("path")
            .and_then(serde_json::Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        match tokio::task::spawn_blocking(move || glob_dir(&root, &pattern)).await {
            Ok(Ok(matched)) if matched.is_empty() => ToolResult::ok("no matches"),
            Ok(Ok(matched)) => ToolResult::ok(matched.join("\n")),
            Ok(Err(e)) => ToolResult::err(e),
            Err(e) => ToolResult::err(format!("glob task panicked: {e}")),
        }
    }
}

fn glob_dir(root: &Path, pattern: &str) -> Result<Vec<String>, String> {
    let pattern =
        Pattern::new(pattern).map_err(|e| format!("invalid glob pattern: {pattern}: {e}"))?;

    let mut matched: Vec<String> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).unwrap_or(e.path());
            let as_str = relative.to_string_lossy().replace('\\', "/");
            pattern.matches(&as_str).then(|| e.path().display().to_string())
        })
        .take(MAX_RESULTS)
        .collect();
    matched.sort();

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grep_finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello\nworld\nfoobar\n").await.unwrap();
        let grep = GrepTool;
        let result = grep
            .execute(json!({"pattern": "^foo", "path": dir.path().to_string_lossy()}))
            .await;
        assert!(result.output.unwrap().contains("foobar"));
    }

    #[tokio::test]
    async fn grep_reports_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello\n").await.unwrap();
        let grep = GrepTool;
        let result = grep
            .execute(json!({"pattern": "zzz", "path": dir.path().to_string_lossy()}))
            .await;
        assert_eq!(result.output.as_deref(), Some("no matches"));
    }

    #[tokio::test]
    async fn grep_rejects_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let grep = GrepTool;
        let result = grep
            .execute(json!({"pattern": "(unclosed", "path": dir.path().to_string_lossy()}))
            .await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn glob_matches_extension() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "").await.unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
        let glob = GlobTool;
        let result = glob
            .execute(json!({"pattern": "*.rs", "path": dir.path().to_string_lossy()}))
            .await;
        let out = result.output.unwrap();
        assert!(out.contains("a.rs"));
        assert!(!out.contains("b.txt"));
    }

    #[tokio::test]
    async fn glob_double_star_matches_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("src/lib")).await.unwrap();
        tokio::fs::write(dir.path().join("src/lib/foo.rs"), "").await.unwrap();
        tokio::fs::write(dir.path().join("src/lib/foo.txt"), "").await.unwrap();
        let glob = GlobTool;
        let result = glob
            .execute(json!({"pattern": "**/*.rs", "path": dir.path().to_string_lossy()}))
            .await;
        let out = result.output.unwrap();
        assert!(out.contains("foo.rs"));
        assert!(!out.contains("foo.txt"));
    }
}
