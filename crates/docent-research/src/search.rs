//! Search collaborator interface.
//!
//! Every query the pipeline issues goes through [`ScopedSearch`], which pins
//! it to the configured documentation site before hitting the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A web search provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one query.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Shared search backend handle.
pub type SharedSearch = Arc<dyn SearchBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Site scoping
// ─────────────────────────────────────────────────────────────────────────────

/// Restricts queries to one documentation site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    site: String,
}

impl SiteScope {
    pub fn new(site: impl Into<String>) -> Self {
        let site = site.into();
        let site = site
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        Self { site }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Prefix `query` with the site operator unless it already carries it.
    pub fn apply(&self, query: &str) -> String {
        let query = query.trim();
        let prefix = format!("site:{}", self.site);
        if query.starts_with(&prefix) {
            query.to_string()
        } else {
            format!("{} {}", prefix, query)
        }
    }
}

/// A search backend bound to a site scope.
#[derive(Clone)]
pub struct ScopedSearch {
    backend: SharedSearch,
    scope: SiteScope,
}

impl ScopedSearch {
    pub fn new(backend: SharedSearch, scope: SiteScope) -> Self {
        Self { backend, scope }
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    /// Run one scoped query.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let scoped = self.scope.apply(query);
        tracing::debug!(provider = self.backend.name(), query = %scoped, "Searching");
        self.backend.search(&scoped).await
    }

    /// Run a batch of queries in order. Failures are logged and skipped;
    /// the results of every successful query are concatenated.
    pub async fn search_all(&self, queries: &[String]) -> BatchResults {
        let mut batch = BatchResults::default();
        for query in queries {
            match self.search(query).await {
                Ok(results) => {
                    batch.succeeded += 1;
                    batch.results.extend(results);
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Search failed, continuing");
                    batch.failed += 1;
                }
            }
        }
        batch
    }
}

/// Outcome of a query batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    pub results: Vec<SearchResult>,
    pub succeeded: usize,
    pub failed: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted search backend for tests and offline runs.
///
/// Queries containing a scripted key return that key's results. Everything
/// else gets a single echo result whose URL is derived from the query.
#[derive(Debug, Default)]
pub struct MockSearch {
    scripted: HashMap<String, Vec<SearchResult>>,
    fail_on: Vec<String>,
    echo: bool,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    /// A mock that returns nothing for unscripted queries.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that echoes one result per unscripted query.
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Return `results` for queries containing `needle`.
    pub fn with_results(mut self, needle: impl Into<String>, results: Vec<SearchResult>) -> Self {
        self.scripted.insert(needle.into(), results);
        self
    }

    /// Fail queries containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on.push(needle.into());
        self
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if let Ok(mut log) = self.queries.lock() {
            log.push(query.to_string());
        }

        if self.fail_on.iter().any(|n| query.contains(n.as_str())) {
            return Err(SearchError::Request {
                provider: "mock".to_string(),
                message: format!("scripted failure for '{}'", query),
            });
        }

        let mut keys: Vec<&String> = self.scripted.keys().collect();
        keys.sort();
        if let Some(key) = keys.into_iter().find(|k| query.contains(k.as_str())) {
            return Ok(self.scripted[key].clone());
        }

        if self.echo {
            let slug: String = query
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                .collect();
            return Ok(vec![SearchResult::new(
                query,
                format!("https://mock.search/{}", slug),
                format!("Result for {}", query),
            )]);
        }

        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_scope_apply() {
        let scope = SiteScope::new("https://google.github.io/adk-docs/");
        assert_eq!(scope.site(), "google.github.io/adk-docs");
        assert_eq!(
            scope.apply("  session state "),
            "site:google.github.io/adk-docs session state"
        );
        assert_eq!(
            scope.apply("site:google.github.io/adk-docs tools"),
            "site:google.github.io/adk-docs tools"
        );
    }

    #[tokio::test]
    async fn test_scoped_search_prefixes_queries() {
        let mock = Arc::new(MockSearch::echo());
        let scoped = ScopedSearch::new(mock.clone(), SiteScope::new("docs.example.com"));

        let results = scoped.search("runners").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(mock.queries(), vec!["site:docs.example.com runners"]);
    }

    #[tokio::test]
    async fn test_search_all_skips_failures() {
        let mock = Arc::new(
            MockSearch::new()
                .with_results("alpha", vec![SearchResult::new("A", "https://a", "")])
                .failing_on("beta"),
        );
        let scoped = ScopedSearch::new(mock.clone(), SiteScope::new("x.dev"));

        let batch = scoped
            .search_all(&["alpha".to_string(), "beta".to_string(), "gamma".to_string()])
            .await;
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.succeeded, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(mock.query_count(), 3);
    }
}
