use crate::llm::{LLMError, Model, TokenUsage};
use crate::search::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub mod events;
pub mod learning;
pub mod orchestrator;
pub mod queries;
pub mod relevance;
pub mod report;
#[cfg(test)]
pub(crate) mod testing;

pub use events::{EventSink, ResearchEvent};
pub use orchestrator::Researcher;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    pub query: String,
    pub url: String,
    pub learning: String,
    pub follow_up_questions: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub used_sources: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub initial_query: String,
    pub depth: u32,
    pub breadth: usize,
    pub model: Model,
}

impl ResearchRequest {
    pub fn validate(&self, max_depth: u32, max_breadth: usize) -> Result<(), ResearchError> {
        if self.initial_query.trim().is_empty() {
            return Err(ResearchError::InvalidRequest(
                "initialQuery must not be empty".to_string(),
            ));
        }
        if self.depth < 1 || self.depth > max_depth {
            return Err(ResearchError::InvalidRequest(format!(
                "depth must be between 1 and {max_depth}"
            )));
        }
        if self.breadth < 1 || self.breadth > max_breadth {
            return Err(ResearchError::InvalidRequest(format!(
                "breadth must be between 1 and {max_breadth}"
            )));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Sub-query generation failed: {0}")]
    SubQueryGeneration(#[source] LLMError),
    #[error("Query refinement failed: {0}")]
    Refinement(#[source] LLMError),
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
    #[error("Learning extraction failed: {0}")]
    LearningExtraction(#[source] LLMError),
    #[error("Report synthesis failed: {0}")]
    ReportSynthesis(#[source] LLMError),
    #[error("No learnings were found for this topic; try a broader query or a greater depth")]
    NoLearnings,
    #[error("Invalid research request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Default)]
struct OrderedSet {
    members: HashSet<String>,
    order: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: &str) -> bool {
        if !self.members.insert(value.to_string()) {
            return false;
        }
        self.order.push(value.to_string());
        true
    }

    fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }
}

/// Progress of one research run. Every collection only grows; recursive
/// levels receive the same state by `&mut` so they see all prior work.
#[derive(Debug, Clone)]
pub struct ResearchState {
    initial_query: String,
    completed_queries: OrderedSet,
    all_learnings: Vec<Learning>,
    approved_urls: OrderedSet,
    attempted_urls: HashSet<String>,
    token_tracker: TokenUsage,
}

impl ResearchState {
    pub fn new(initial_query: impl Into<String>) -> Self {
        Self {
            initial_query: initial_query.into(),
            completed_queries: OrderedSet::default(),
            all_learnings: Vec::new(),
            approved_urls: OrderedSet::default(),
            attempted_urls: HashSet::new(),
            token_tracker: TokenUsage::default(),
        }
    }

    pub fn initial_query(&self) -> &str {
        &self.initial_query
    }

    /// Marks `query` as dispatched. Returns `false` if it already was.
    pub fn mark_completed(&mut self, query: &str) -> bool {
        self.completed_queries.insert(query)
    }

    pub fn is_completed(&self, query: &str) -> bool {
        self.completed_queries.contains(query)
    }

    pub fn completed_queries(&self) -> &[String] {
        &self.completed_queries.order
    }

    pub fn learnings(&self) -> &[Learning] {
        &self.all_learnings
    }

    pub fn add_learning(&mut self, learning: Learning) {
        self.all_learnings.push(learning);
    }

    pub fn approve_url(&mut self, url: &str) -> bool {
        self.approved_urls.insert(url)
    }

    pub fn is_approved(&self, url: &str) -> bool {
        self.approved_urls.contains(url)
    }

    pub fn approved_urls(&self) -> &[String] {
        &self.approved_urls.order
    }

    /// Records that the content fetcher is about to be invoked for `url`.
    /// Returns `false` if it already was during this run.
    pub fn mark_attempted(&mut self, url: &str) -> bool {
        self.attempted_urls.insert(url.to_string())
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.token_tracker += usage;
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.token_tracker
    }
}
