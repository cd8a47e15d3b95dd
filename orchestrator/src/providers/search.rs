//! Web search providers: Tavily, DuckDuckGo, and the routing policy
//! combining them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::WebSearch;
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::SearchHit;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const DDG_ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: search_http_client(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "advanced",
            "max_results": max_results,
        });

        let resp = self
            .http
            .post(TAVILY_ENDPOINT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| r.url.starts_with("http"))
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}

/// DuckDuckGo instant-answer API. Returns URL-only hits (no snippets of
/// substance), so callers fetch each result for real content.
pub struct DuckDuckGoClient {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct DdgResponse {
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

#[derive(Deserialize)]
struct DdgTopic {
    #[serde(rename = "FirstURL", default)]
    first_url: String,
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "Topics", default)]
    topics: Vec<DdgTopic>,
}

impl DuckDuckGoClient {
    pub fn new() -> Self {
        Self {
            http: search_http_client(),
        }
    }

    fn flatten(topics: Vec<DdgTopic>, out: &mut Vec<SearchHit>, max_results: usize) {
        for t in topics {
            if out.len() >= max_results {
                return;
            }
            if t.first_url.starts_with("http") {
                out.push(SearchHit {
                    title: t.text.clone(),
                    url: t.first_url,
                    content: t.text,
                });
            } else if !t.topics.is_empty() {
                Self::flatten(t.topics, out, max_results);
            }
        }
    }
}

impl Default for DuckDuckGoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let resp = self
            .http
            .get(DDG_ENDPOINT)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: DdgResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let mut hits = Vec::new();
        Self::flatten(parsed.related_topics, &mut hits, max_results);
        Ok(hits)
    }
}

/// Provider selection policy:
/// - Tavily key set and `USE_TAVILY_ONLY` → Tavily alone.
/// - No Tavily key → DuckDuckGo alone.
/// - Otherwise Tavily first, DuckDuckGo on failure or empty results.
pub struct SearchRouter {
    primary: Arc<dyn WebSearch>,
    fallback: Option<Arc<dyn WebSearch>>,
}

impl SearchRouter {
    pub fn from_config(config: &Config) -> Self {
        match (&config.tavily_api_key, config.use_tavily_only) {
            (Some(key), true) => Self {
                primary: Arc::new(TavilyClient::new(key)),
                fallback: None,
            },
            (Some(key), false) => Self {
                primary: Arc::new(TavilyClient::new(key)),
                fallback: Some(Arc::new(DuckDuckGoClient::new())),
            },
            (None, _) => Self {
                primary: Arc::new(DuckDuckGoClient::new()),
                fallback: None,
            },
        }
    }

    #[cfg(test)]
    pub fn with_providers(primary: Arc<dyn WebSearch>, fallback: Option<Arc<dyn WebSearch>>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl WebSearch for SearchRouter {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        match self.primary.search(query, max_results).await {
            Ok(hits) if !hits.is_empty() => Ok(hits),
            Ok(_) => match &self.fallback {
                Some(fb) => fb.search(query, max_results).await,
                None => Ok(vec![]),
            },
            Err(e) => match &self.fallback {
                Some(fb) => {
                    warn!("primary search provider failed, falling back: {}", e);
                    fb.search(query, max_results).await
                }
                None => Err(e),
            },
        }
    }
}

fn search_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap_or_default()
}
