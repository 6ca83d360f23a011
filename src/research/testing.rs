use crate::llm::{Completion, CompletionRequest, LLMError, LanguageModel, TokenUsage};
use crate::prompts::{
    LEARNING_SYSTEM_PROMPT, REFINE_QUERY_SYSTEM_PROMPT, RELEVANCE_SYSTEM_PROMPT,
    REPORT_SYSTEM_PROMPT, SUB_QUERIES_SYSTEM_PROMPT,
};
use crate::research::{EventSink, ResearchEvent};
use crate::search::{SearchError, SearchProvider, SearchResult};
use crate::webpage_parse::{ContentFetcher, Document, DocumentMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const STUB_USAGE: TokenUsage = TokenUsage {
    input_tokens: 10,
    output_tokens: 5,
};

pub const BOGUS_SOURCE: &str = "https://not-a-source.example";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    SubQueries,
    Refine,
    Relevance,
    Learning,
    Report,
}

impl PromptKind {
    pub fn of(request: &CompletionRequest) -> Option<PromptKind> {
        let system = request.messages.first().map(|m| m.content.as_str())?;
        match system {
            SUB_QUERIES_SYSTEM_PROMPT => Some(PromptKind::SubQueries),
            REFINE_QUERY_SYSTEM_PROMPT => Some(PromptKind::Refine),
            RELEVANCE_SYSTEM_PROMPT => Some(PromptKind::Relevance),
            LEARNING_SYSTEM_PROMPT => Some(PromptKind::Learning),
            REPORT_SYSTEM_PROMPT => Some(PromptKind::Report),
            _ => None,
        }
    }
}

pub fn section<'a>(context: &'a str, heading: &str) -> &'a str {
    let marker = format!("# {heading}\n");
    let Some(start) = context.find(&marker) else {
        return "";
    };
    let rest = &context[start + marker.len()..];
    match rest.find("\n\n# ") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn user_context(request: &CompletionRequest) -> &str {
    request
        .messages
        .get(1)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

type Override = Box<dyn Fn(PromptKind, &str) -> Option<Result<String, LLMError>> + Send + Sync>;

/// Language model answering every research prompt with canned, deterministic
/// text. Individual prompt kinds can be overridden per test.
pub struct ScriptedModel {
    levels: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
    override_with: Option<Override>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            levels: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            override_with: None,
        }
    }

    pub fn with_override(
        f: impl Fn(PromptKind, &str) -> Option<Result<String, LLMError>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            override_with: Some(Box::new(f)),
            ..Self::new()
        }
    }

    pub fn requests_of(&self, kind: PromptKind) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| PromptKind::of(request) == Some(kind))
            .cloned()
            .collect()
    }

    fn canned(&self, kind: PromptKind, context: &str) -> String {
        match kind {
            PromptKind::SubQueries => {
                let level = self.levels.fetch_add(1, Ordering::SeqCst);
                let n: usize = section(context, "N").trim().parse().unwrap_or(1);
                (0..n)
                    .map(|i| format!("{}. level {level} facet {i}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            PromptKind::Refine => format!("refined {}", section(context, "Facet")),
            PromptKind::Relevance => r#"{"classification": "RELEVANT"}"#.to_string(),
            PromptKind::Learning => {
                let query = section(context, "Search query");
                serde_json::json!({
                    "learning": format!("Learned about {query}."),
                    "followUpQuestions": [format!("What follows from {query}?")]
                })
                .to_string()
            }
            PromptKind::Report => {
                let mut sources: Vec<String> = section(context, "Learnings")
                    .lines()
                    .filter_map(|line| line.strip_prefix('['))
                    .filter_map(|line| line.split_once("] ").map(|(_, url)| url.to_string()))
                    .collect();
                sources.push(BOGUS_SOURCE.to_string());
                format!(
                    "```json\n{}\n```",
                    serde_json::json!({
                        "title": "Impact report",
                        "summary": "X changes Y [1].",
                        "sections": [{"title": "Findings", "content": "Details [1]."}],
                        "usedSources": sources
                    })
                )
            }
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LLMError> {
        self.requests.lock().push(request.clone());
        let kind = PromptKind::of(&request)
            .ok_or_else(|| LLMError::RequestBuildingError("unexpected prompt".to_string()))?;
        let context = user_context(&request);
        let content = match self.override_with.as_ref().and_then(|f| f(kind, context)) {
            Some(answer) => answer?,
            None => self.canned(kind, context),
        };
        Ok(Completion {
            content,
            usage: STUB_USAGE,
        })
    }
}

pub const SHARED_HOST: &str = "https://shared.com";

/// Search provider returning `results_per_query` fixed results for every
/// query, or none at all. Result URLs are unique per query unless the stub
/// was built with [`StubSearch::shared`].
pub struct StubSearch {
    results_per_query: usize,
    queries: Mutex<Vec<String>>,
    fail_with_quota: bool,
    shared_urls: bool,
}

impl StubSearch {
    pub fn new(results_per_query: usize) -> Self {
        Self {
            results_per_query,
            queries: Mutex::new(Vec::new()),
            fail_with_quota: false,
            shared_urls: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_with_quota: true,
            ..Self::new(0)
        }
    }

    pub fn shared(results_per_query: usize) -> Self {
        Self {
            shared_urls: true,
            ..Self::new(results_per_query)
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

pub fn slug(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.queries.lock().push(query.to_string());
        if self.fail_with_quota {
            return Err(SearchError::QuotaExceeded);
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok((0..self.results_per_query)
            .map(|i| SearchResult {
                title: format!("Result {i} for {query}"),
                url: if self.shared_urls {
                    format!("{SHARED_HOST}/{i}")
                } else {
                    format!("https://example.com/{}/{i}", slug(query))
                },
                snippet: format!("Snippet {i}"),
                published_at: None,
            })
            .collect())
    }
}

/// Content fetcher producing a document for every URL except those matching
/// `unreachable`.
pub struct StubFetcher {
    urls: Mutex<Vec<String>>,
    unreachable: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            unreachable: None,
        }
    }

    pub fn unreachable_when(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            unreachable: Some(Box::new(f)),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch_and_parse_content(&self, result: &SearchResult) -> Option<Document> {
        self.urls.lock().push(result.url.clone());
        if self.unreachable.as_ref().is_some_and(|f| f(&result.url)) {
            return None;
        }
        Some(Document::new(
            format!("Full text of {}", result.url),
            DocumentMetadata {
                title: result.title.clone(),
                url: result.url.clone(),
                published_at: None,
                author: None,
            },
        ))
    }
}

#[derive(Default)]
pub struct EventCollector {
    events: Mutex<Vec<ResearchEvent>>,
}

impl EventCollector {
    pub fn events(&self) -> Vec<ResearchEvent> {
        self.events.lock().clone()
    }

    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.event_type()).collect()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: ResearchEvent) {
        self.events.lock().push(event);
    }
}
