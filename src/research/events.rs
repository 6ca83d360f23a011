use crate::llm::TokenUsage;
use crate::research::{Learning, ResearchReport};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ResearchEvent {
    QueryStart(String),
    #[serde(rename = "token-usage")]
    StepUsage { step: String, usage: TokenUsage },
    RefiningQuery { query: String, usage: TokenUsage },
    RelevanceCheck { usage: TokenUsage },
    Learning { learning: Learning, usage: TokenUsage },
    Report { report: ResearchReport, usage: TokenUsage },
    Error(String),
    Done {
        message: String,
        #[serde(rename = "totalUsage")]
        total_usage: TokenUsage,
    },
}

impl ResearchEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ResearchEvent::QueryStart(_) => "query-start",
            ResearchEvent::StepUsage { .. } => "token-usage",
            ResearchEvent::RefiningQuery { .. } => "refining-query",
            ResearchEvent::RelevanceCheck { .. } => "relevance-check",
            ResearchEvent::Learning { .. } => "learning",
            ResearchEvent::Report { .. } => "report",
            ResearchEvent::Error(_) => "error",
            ResearchEvent::Done { .. } => "done",
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            ResearchEvent::StepUsage { usage, .. }
            | ResearchEvent::RefiningQuery { usage, .. }
            | ResearchEvent::RelevanceCheck { usage }
            | ResearchEvent::Learning { usage, .. }
            | ResearchEvent::Report { usage, .. } => Some(*usage),
            _ => None,
        }
    }
}

/// Receives progress events. `emit` is called between awaits and must not
/// block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ResearchEvent);
}

impl EventSink for UnboundedSender<ResearchEvent> {
    fn emit(&self, event: ResearchEvent) {
        if self.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding research event");
        }
    }
}
