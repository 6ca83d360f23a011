use crate::llm::{generate_object, LLMError, LanguageModel, Model, TokenUsage};
use crate::prompts::{build_report_context, Prompt, REPORT_SYSTEM_PROMPT};
use crate::research::{Learning, ResearchReport};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: ResearchReport,
    pub usage: TokenUsage,
}

/// Writes the final report from every learning of the run. Callers must not
/// pass an empty slice.
pub async fn generate_report(
    llm: &dyn LanguageModel,
    learnings: &[Learning],
    query: &str,
    model: Model,
) -> Result<GeneratedReport, LLMError> {
    let prompt = Prompt::new(
        REPORT_SYSTEM_PROMPT.to_string(),
        build_report_context(query, learnings),
    );
    let response = generate_object::<ResearchReport>(llm, model, prompt).await?;
    let mut report = response.value;
    report.used_sources = known_sources(report.used_sources, learnings);
    tracing::info!(
        sections = report.sections.len(),
        sources = report.used_sources.len(),
        "report generated"
    );
    Ok(GeneratedReport {
        report,
        usage: response.usage,
    })
}

// Keeps cited URLs that belong to a learning, first occurrence only.
fn known_sources(cited: Vec<String>, learnings: &[Learning]) -> Vec<String> {
    let known: HashSet<&str> = learnings.iter().map(|l| l.url.as_str()).collect();
    let mut seen = HashSet::new();
    cited
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| known.contains(url.as_str()) && seen.insert(url.clone()))
        .collect()
}
