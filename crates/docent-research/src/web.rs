//! HTTP search providers.

use std::time::Duration;

use async_trait::async_trait;
use docent_config::{SearchConfig, SearchProviderKind};
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::SearchError;
use crate::search::{SearchBackend, SearchResult};

/// Web search over one of the supported providers.
#[derive(Debug, Clone)]
pub struct WebSearch {
    client: Client,
    provider: SearchProviderKind,
    api_key: Option<String>,
    max_results: usize,
}

impl WebSearch {
    /// Build from config and an already-resolved API key.
    ///
    /// Keyed providers fail here rather than on the first query.
    pub fn new(config: &SearchConfig, api_key: Option<String>) -> Result<Self, SearchError> {
        if config.provider.env_var().is_some() && api_key.is_none() {
            return Err(SearchError::Config(format!(
                "{} requires an API key (set {})",
                provider_name(config.provider),
                config.provider.env_var().unwrap_or_default()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: config.provider,
            api_key,
            max_results: config.max_results,
        })
    }

    fn key(&self) -> Result<&str, SearchError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SearchError::Config(format!("{} API key missing", self.name())))
    }

    async fn fetch_json(&self, request: reqwest::RequestBuilder) -> Result<Value, SearchError> {
        let provider = self.name().to_string();
        let response = request.send().await.map_err(|e| SearchError::Request {
            provider: provider.clone(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(SearchError::Status {
                provider,
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(|e| SearchError::Parse {
            provider,
            message: e.to_string(),
        })
    }

    async fn search_brave(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            self.max_results
        );
        let request = self
            .client
            .get(&url)
            .header("X-Subscription-Token", self.key()?)
            .header("Accept", "application/json");
        Ok(parse_brave(&self.fetch_json(request).await?))
    }

    async fn search_serper(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let request = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", self.key()?)
            .json(&json!({ "q": query, "num": self.max_results }));
        Ok(parse_serper(&self.fetch_json(request).await?))
    }

    async fn search_tavily(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let request = self.client.post("https://api.tavily.com/search").json(&json!({
            "api_key": self.key()?,
            "query": query,
            "max_results": self.max_results
        }));
        Ok(parse_tavily(&self.fetch_json(request).await?))
    }

    async fn search_duckduckgo(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );
        let data = self.fetch_json(self.client.get(&url)).await?;
        Ok(parse_duckduckgo(&data, self.max_results))
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let mut results = match self.provider {
            SearchProviderKind::Brave => self.search_brave(query).await?,
            SearchProviderKind::Serper => self.search_serper(query).await?,
            SearchProviderKind::Tavily => self.search_tavily(query).await?,
            SearchProviderKind::Duckduckgo => self.search_duckduckgo(query).await?,
        };
        results.truncate(self.max_results);
        Ok(results)
    }

    fn name(&self) -> &str {
        provider_name(self.provider)
    }
}

fn provider_name(provider: SearchProviderKind) -> &'static str {
    match provider {
        SearchProviderKind::Brave => "brave",
        SearchProviderKind::Serper => "serper",
        SearchProviderKind::Tavily => "tavily",
        SearchProviderKind::Duckduckgo => "duckduckgo",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

fn collect_results(items: Option<&Vec<Value>>, url_key: &str, snippet_key: &str) -> Vec<SearchResult> {
    items
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    Some(SearchResult {
                        title: r["title"].as_str()?.to_string(),
                        url: r[url_key].as_str()?.to_string(),
                        snippet: r[snippet_key].as_str().unwrap_or("").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_brave(data: &Value) -> Vec<SearchResult> {
    collect_results(data["web"]["results"].as_array(), "url", "description")
}

fn parse_serper(data: &Value) -> Vec<SearchResult> {
    collect_results(data["organic"].as_array(), "link", "snippet")
}

fn parse_tavily(data: &Value) -> Vec<SearchResult> {
    collect_results(data["results"].as_array(), "url", "content")
}

fn parse_duckduckgo(data: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(abstract_text) = data["AbstractText"].as_str()
        && !abstract_text.is_empty()
    {
        results.push(SearchResult {
            title: data["Heading"].as_str().unwrap_or("Result").to_string(),
            url: data["AbstractURL"].as_str().unwrap_or("").to_string(),
            snippet: abstract_text.to_string(),
        });
    }

    if let Some(topics) = data["RelatedTopics"].as_array() {
        let remaining = max_results.saturating_sub(results.len());
        for topic in topics.iter().take(remaining) {
            if let (Some(text), Some(url)) = (topic["Text"].as_str(), topic["FirstURL"].as_str()) {
                let title = if text.chars().count() > 50 {
                    text.chars().take(50).collect::<String>() + "..."
                } else {
                    text.to_string()
                };
                results.push(SearchResult {
                    title,
                    url: url.to_string(),
                    snippet: text.to_string(),
                });
            }
        }
    }

    results
}
