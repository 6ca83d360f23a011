use crate::cache::Cache;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Title: {}\nURL: {}\nSnippet: {}\nPublished: {}",
            self.title,
            self.url,
            self.snippet,
            self.published_at.as_deref().unwrap_or("unknown")
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
struct SearxSearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "publishedDate", default)]
    published_date: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxSearchResult>,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Search provider returned server error: {status}")]
    ServerError { status: u16 },
    #[error("Search provider rejected the request (403); check its configuration")]
    Forbidden,
    #[error("Search provider quota exceeded (429)")]
    QuotaExceeded,
    #[error("Search provider returned status {status}")]
    ProviderError { status: u16 },
    #[error("Search provider returned an unreadable body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl SearchError {
    /// Network failures and 5xx responses are worth another attempt; quota
    /// and permission errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::RequestError(_) | SearchError::ServerError { .. }
        )
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const SEARX_RESULTS_PER_PAGE: usize = 8;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SearxSearchProvider {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    cache: Arc<dyn Cache<Vec<SearchResult>>>,
    cache_ttl: Duration,
    retry: RetryPolicy,
}

impl SearxSearchProvider {
    pub fn new(
        base_url: impl Into<String>,
        cache: Arc<dyn Cache<Vec<SearchResult>>>,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(SearchError::RequestError)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn single_page_search(
        &self,
        query: &str,
        pageno: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("language", "en"),
                ("pageno", pageno.to_string().as_str()),
            ])
            .send()
            .await
            .map_err(SearchError::RequestError)?;
        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::FORBIDDEN => SearchError::Forbidden,
                StatusCode::TOO_MANY_REQUESTS => SearchError::QuotaExceeded,
                s if s.is_server_error() => SearchError::ServerError { status: s.as_u16() },
                s => SearchError::ProviderError { status: s.as_u16() },
            });
        }
        let searx_response = response
            .json::<SearxResponse>()
            .await
            .map_err(SearchError::Decode)?;
        Ok(searx_response
            .results
            .into_iter()
            .map(|result| SearchResult {
                title: result.title,
                url: result.url,
                snippet: result.content.unwrap_or_default(),
                published_at: result.published_date,
            })
            .collect())
    }

    async fn search_uncached(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let num_pages = self.max_results.div_ceil(SEARX_RESULTS_PER_PAGE);
        let futures: Vec<_> = (1..=num_pages)
            .map(|pageno| self.single_page_search(query, pageno))
            .collect();
        let mut all_results = Vec::new();
        for page_result in join_all(futures).await {
            for result in page_result? {
                if all_results.len() >= self.max_results {
                    break;
                }
                all_results.push(result);
            }
        }
        Ok(all_results)
    }

    async fn search_with_retry(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.search_uncached(query).await {
                Ok(results) => return Ok(results),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        query,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "search failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SearchProvider for SearxSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            tracing::debug!("blank search query, returning no results");
            return Ok(Vec::new());
        }
        if let Some(results) = self.cache.get(query) {
            tracing::debug!(query, "search cache hit");
            return Ok(results);
        }
        let results = self.search_with_retry(query).await?;
        tracing::debug!(query, count = results.len(), "search completed");
        self.cache
            .set(query.to_string(), results.clone(), self.cache_ttl);
        Ok(results)
    }
}
