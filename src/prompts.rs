use crate::llm::{Message, Role};
use crate::research::Learning;
use crate::search::SearchResult;

#[derive(Debug, Clone)]
pub struct Prompt {
    pub instruction: String,
    pub context: String,
}

impl Prompt {
    pub fn new(instruction: String, context: String) -> Self {
        Self {
            instruction,
            context,
        }
    }

    pub fn build_messages(self) -> Vec<Message> {
        vec![
            Message {
                role: Role::System,
                content: self.instruction,
            },
            Message {
                role: Role::User,
                content: self.context,
            },
        ]
    }
}

pub const SUB_QUERIES_SYSTEM_PROMPT: &str = r#"# Task
You will be given a research topic and a number N.
Break the topic into N distinct search engine queries that together explore its most important facets.
Each query should stand on its own and be ready to paste into a web search engine.

## General context
You are serving a very specific step within a recursive web research tool.
The tool breaks a research topic into search queries, reads the best source for each query, records short learnings and follows up on open questions before writing a report.

## Format
Respond with exactly one query per line.
Do not number the queries, do not use bullet points, quotes or markdown, and do not add any other text."#;

pub const REFINE_QUERY_SYSTEM_PROMPT: &str = r#"# Task
You will be given the overall goal of a research session and one facet of it.
Combine them into a single compact web search query that finds sources about the facet in the context of the goal.

## Format
Respond with the search query only, on one line, with no quotes or explanation."#;

pub const RELEVANCE_SYSTEM_PROMPT: &str = r#"# Task
You will be given a search query, one web search result and a list of URLs that have already been used.
Decide whether the result is worth reading for the query.
The result is IRRELEVANT if its URL is in the list of already used URLs, if it duplicates a source that was already used, or if it does not help answer the query.
Otherwise it is RELEVANT.

## Format
Respond with a JSON object in the following format:
{"classification": "RELEVANT"}
or
{"classification": "IRRELEVANT"}"#;

pub const LEARNING_SYSTEM_PROMPT: &str = r#"# Task
You will be given a search query and the text of a web document found for it.
Extract the single most important learning the document offers about the query, in one or two sentences.
Be specific: keep names, numbers, dates and measurements.
Then write between one and three follow-up questions that would deepen the research.

## Format
Respond with a JSON object in the following format:
{
    "learning": "<one or two sentences>",
    "followUpQuestions": ["<question>", "<question>"]
}"#;

pub const REPORT_SYSTEM_PROMPT: &str = r#"# Task
You will be given a research topic and a numbered list of learnings, each with its source URL.
Write a structured research report about the topic that is grounded in the learnings.
Cite sources inline with their bracketed number, for example [1] or [2][3].
Only make claims that the learnings support.

## Format
Respond with a JSON object in the following format:
{
    "title": "<report title>",
    "summary": "<executive summary, one paragraph>",
    "sections": [
        {"title": "<section title>", "content": "<section body with [n] citations>"}
    ],
    "usedSources": ["<URL of every source you cited, and no others>"]
}"#;

pub fn build_sub_queries_context(query: &str, breadth: usize) -> String {
    format!("# Research topic\n{query}\n\n# N\n{breadth}")
}

pub fn build_refine_query_context(initial_query: &str, sub_query: &str) -> String {
    format!("# Overall goal\n{initial_query}\n\n# Facet\n{sub_query}")
}

pub fn build_relevance_context(
    query: &str,
    result: &SearchResult,
    existing_urls: &[String],
) -> String {
    let used = if existing_urls.is_empty() {
        "(none)".to_string()
    } else {
        existing_urls
            .iter()
            .map(|url| format!("- {url}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("# Search query\n{query}\n\n# Search result\n{result}\n\n# Already used URLs\n{used}")
}

pub fn build_learning_context(query: &str, title: &str, url: &str, text: &str) -> String {
    format!("# Search query\n{query}\n\n# Document: {title} ({url})\n{text}")
}

pub fn build_report_context(query: &str, learnings: &[Learning]) -> String {
    let sources = learnings
        .iter()
        .enumerate()
        .map(|(i, learning)| format!("[{}] {}\n{}", i + 1, learning.url, learning.learning))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("# Research topic\n{query}\n\n# Learnings\n{sources}")
}

pub fn build_follow_up_research_prompt(
    initial_query: &str,
    completed_queries: &[String],
    follow_up_questions: &[String],
) -> String {
    let bullet = |items: &[String]| {
        items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Overall research goal: {initial_query}\n\nQueries already searched (do not repeat them):\n{}\n\nOpen follow-up questions to investigate next:\n{}",
        bullet(completed_queries),
        bullet(follow_up_questions)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_context_numbers_sources_from_one() {
        let learnings = vec![
            Learning {
                query: "q1".to_string(),
                url: "https://a.com".to_string(),
                learning: "A is true.".to_string(),
                follow_up_questions: vec![],
            },
            Learning {
                query: "q2".to_string(),
                url: "https://b.com".to_string(),
                learning: "B is false.".to_string(),
                follow_up_questions: vec![],
            },
        ];
        let context = build_report_context("topic", &learnings);
        assert!(context.contains("[1] https://a.com\nA is true."));
        assert!(context.contains("[2] https://b.com\nB is false."));
    }

    #[test]
    fn relevance_context_lists_used_urls() {
        let result = SearchResult {
            title: "T".to_string(),
            url: "https://a.com".to_string(),
            snippet: "S".to_string(),
            published_at: None,
        };
        let context = build_relevance_context("q", &result, &["https://b.com".to_string()]);
        assert!(context.contains("- https://b.com"));
        assert!(context.contains("URL: https://a.com"));
        let empty = build_relevance_context("q", &result, &[]);
        assert!(empty.contains("(none)"));
    }

    #[test]
    fn follow_up_prompt_carries_goal_and_history() {
        let prompt = build_follow_up_research_prompt(
            "impact of X on Y",
            &["x basics".to_string()],
            &["how big is the effect?".to_string()],
        );
        assert!(prompt.starts_with("Overall research goal: impact of X on Y"));
        assert!(prompt.contains("- x basics"));
        assert!(prompt.contains("- how big is the effect?"));
    }
}
