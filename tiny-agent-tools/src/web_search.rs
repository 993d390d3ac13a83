//! The `web_search` tool — a thin adapter from [`tiny_agent_tool::Tool`]
//! onto whichever [`tiny_agent_search::SearchProvider`] the caller wires
//! up, so the backend (scrape vs. API) stays swappable per spec §4.11.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tiny_agent_search::SearchProvider;
use tiny_agent_tool::Tool;
use tiny_agent_types::ToolResult;

pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchTool {
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return a ranked list of title/url/snippet results."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "max_results": {"type": "integer", "description": "Maximum number of results (default 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(query) = args.get("query").and_then(serde_json::Value::as_str) else {
            return ToolResult::err("missing required string argument \"query\"");
        };
        let max_results = args
            .get("max_results")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(5) as usize;

        match self.provider.search(query, max_results).await {
            Ok(results) if results.is_empty() => ToolResult::ok("no results"),
            Ok(results) => {
                let rendered = results
                    .iter()
                    .map(|r| format!("- {} ({})\n  {}", r.title, r.url, r.snippet))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolResult::ok(rendered)
            }
            Err(e) => ToolResult::err(format!("search failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_agent_search::{SearchResult, StaticSearch};

    #[tokio::test]
    async fn renders_results() {
        let tool = WebSearchTool::new(Arc::new(StaticSearch(vec![SearchResult {
            title: "Rust".into(),
            url: "https://rust-lang.org".into(),
            snippet: "A systems language".into(),
        }])));
        let result = tool.execute(json!({"query": "rust"})).await;
        assert!(result.output.unwrap().contains("rust-lang.org"));
    }

    #[tokio::test]
    async fn empty_results_reported_plainly() {
        let tool = WebSearchTool::new(Arc::new(StaticSearch(vec![])));
        let result = tool.execute(json!({"query": "nothing"})).await;
        assert_eq!(result.output.as_deref(), Some("no results"));
    }
}
