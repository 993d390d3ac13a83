//! Pluggable web-search backend (§4.11). Ships one HTML-scraping
//! implementation over DuckDuckGo's lite results page, chosen the way the
//! pack's own scraping code reaches for `scraper` + `reqwest` rather than
//! a paid search API, plus a stub implementation for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiny_agent_types::SearchError;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Abstract capability every search backend implements.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}

/// Domains whose results are promoted to the front of the list,
/// regardless of the backend's own ranking.
const AUTHORITATIVE_DOMAINS: &[&str] = &[
    "docs.rs", "doc.rust-lang.org", "github.com", "stackoverflow.com", "developer.mozilla.org",
    "wikipedia.org",
];

/// Re-sorts `results` so any hit from [`AUTHORITATIVE_DOMAINS`] comes
/// first, preserving relative order within each group (stable sort).
#[must_use]
pub fn promote_authoritative(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by_key(|r| !is_authoritative(&r.url));
    results
}

fn is_authoritative(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else { return false };
    let Some(host) = parsed.host_str() else { return false };
    AUTHORITATIVE_DOMAINS.iter().any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// HTML-scraping backend over DuckDuckGo's JS-free `html` endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new(), base_url: "https://html.duckduckgo.com/html".into() }
    }

    /// Override the endpoint, for testing against a local fixture server.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .header("User-Agent", "tiny-agent/0.1")
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Network(format!("search backend returned {}", response.status())));
        }

        let body = response.text().await.map_err(|e| SearchError::Network(e.to_string()))?;
        let results = parse_results(&body, max_results)?;
        Ok(promote_authoritative(results))
    }
}

fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    let document = scraper::Html::parse_document(html);
    let result_selector = scraper::Selector::parse("div.result")
        .map_err(|e| SearchError::InvalidResponse(format!("bad selector: {e:?}")))?;
    let title_selector = scraper::Selector::parse("a.result__a").expect("static selector");
    let snippet_selector = scraper::Selector::parse("a.result__snippet").expect("static selector");

    let mut out = Vec::new();
    for node in document.select(&result_selector) {
        let Some(title_el) = node.select(&title_selector).next() else { continue };
        let title: String = title_el.text().collect();
        let Some(href) = title_el.value().attr("href") else { continue };
        let snippet: String = node.select(&snippet_selector).next().map(|el| el.text().collect()).unwrap_or_default();

        out.push(SearchResult { title: title.trim().to_string(), url: href.to_string(), snippet: snippet.trim().to_string() });
        if out.len() >= max_results {
            break;
        }
    }
    Ok(out)
}

/// A fixed-response backend for tests and offline use.
pub struct StaticSearch(pub Vec<SearchResult>);

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        Ok(self.0.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult { title: "t".into(), url: url.into(), snippet: "s".into() }
    }

    #[test]
    fn authoritative_domains_are_promoted() {
        let results = vec![result("https://example.com/a"), result("https://docs.rs/tokio")];
        let promoted = promote_authoritative(results);
        assert_eq!(promoted[0].url, "https://docs.rs/tokio");
    }

    #[test]
    fn subdomains_of_authoritative_domains_count() {
        assert!(is_authoritative("https://en.wikipedia.org/wiki/Rust"));
    }

    #[test]
    fn non_authoritative_stays_non_authoritative() {
        assert!(!is_authoritative("https://example.com"));
    }

    #[tokio::test]
    async fn static_search_caps_at_max_results() {
        let backend = StaticSearch(vec![result("a"), result("b"), result("c")]);
        let results = backend.search("q", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn parses_ddg_html_fixture() {
        let html = r#"
            <div class="result">
                <a class="result__a" href="https://example.com/a">Example A</a>
                <a class="result__snippet">An example snippet.</a>
            </div>
            <div class="result">
                <a class="result__a" href="https://docs.rs/tokio">Tokio docs</a>
                <a class="result__snippet">Async runtime.</a>
            </div>
        "#;
        let results = parse_results(html, 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Example A");
        assert_eq!(results[1].url, "https://docs.rs/tokio");
    }
}
