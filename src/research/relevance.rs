use crate::llm::{generate_object, LLMError, LanguageModel, Model, TokenUsage};
use crate::prompts::{build_relevance_context, Prompt, RELEVANCE_SYSTEM_PROMPT};
use crate::search::{SearchError, SearchProvider, SearchResult};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Relevant,
    Irrelevant,
}

#[derive(Deserialize, Debug)]
struct RelevanceJudgement {
    classification: Classification,
}

#[derive(Debug, Clone, Default)]
pub struct RelevantResults {
    pub relevant_results: Vec<SearchResult>,
    pub usage: TokenUsage,
}

/// Classifies one result. URLs that were already used are rejected without
/// asking the model.
pub async fn evaluate_result(
    llm: &dyn LanguageModel,
    query: &str,
    result: &SearchResult,
    existing_urls: &[String],
    model: Model,
) -> Result<(Classification, TokenUsage), LLMError> {
    if existing_urls.iter().any(|url| url == &result.url) {
        return Ok((Classification::Irrelevant, TokenUsage::default()));
    }
    let prompt = Prompt::new(
        RELEVANCE_SYSTEM_PROMPT.to_string(),
        build_relevance_context(query, result, existing_urls),
    );
    let judgement = generate_object::<RelevanceJudgement>(llm, model, prompt).await?;
    Ok((judgement.value.classification, judgement.usage))
}

/// Searches `query` and keeps the results the model judges relevant, in
/// search order. `existing_urls` is read once for the whole batch.
pub async fn search_and_evaluate(
    llm: &dyn LanguageModel,
    search: &dyn SearchProvider,
    query: &str,
    existing_urls: &[String],
    model: Model,
) -> Result<RelevantResults, SearchError> {
    let results = search.search(query).await?;
    if results.is_empty() {
        tracing::debug!(query, "search returned no results");
        return Ok(RelevantResults::default());
    }

    let mut evaluated = RelevantResults::default();
    for result in results {
        match evaluate_result(llm, query, &result, existing_urls, model).await {
            Ok((classification, usage)) => {
                evaluated.usage += usage;
                if classification == Classification::Relevant {
                    evaluated.relevant_results.push(result);
                }
            }
            Err(e) => {
                tracing::warn!(url = %result.url, error = %e, "relevance check failed, skipping result");
            }
        }
    }
    tracing::debug!(
        query,
        relevant = evaluated.relevant_results.len(),
        "relevance check completed"
    );
    Ok(evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::testing::{PromptKind, ScriptedModel, StubSearch, STUB_USAGE};

    #[tokio::test]
    async fn keeps_relevant_results_in_order() {
        let llm = ScriptedModel::with_override(|kind, context| {
            (kind == PromptKind::Relevance).then(|| {
                if context.contains("/1\n") {
                    Ok(r#"{"classification": "IRRELEVANT"}"#.to_string())
                } else {
                    Ok(r#"{"classification": "RELEVANT"}"#.to_string())
                }
            })
        });
        let search = StubSearch::new(3);
        let evaluated = search_and_evaluate(&llm, &search, "solar", &[], Model::GPT4oMini)
            .await
            .unwrap();
        let urls: Vec<_> = evaluated.relevant_results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/solar/0", "https://example.com/solar/2"]
        );
        assert_eq!(evaluated.usage, STUB_USAGE + STUB_USAGE + STUB_USAGE);
    }

    #[tokio::test]
    async fn already_used_urls_are_irrelevant() {
        let llm = ScriptedModel::new();
        let result = SearchResult {
            title: "A".to_string(),
            url: "https://a.com".to_string(),
            snippet: "exactly what the query asks for".to_string(),
            published_at: None,
        };
        let (classification, usage) = evaluate_result(
            &llm,
            "query",
            &result,
            &["https://a.com".to_string()],
            Model::GPT4oMini,
        )
        .await
        .unwrap();
        assert_eq!(classification, Classification::Irrelevant);
        assert!(usage.is_empty());
        assert!(llm.requests_of(PromptKind::Relevance).is_empty());
    }

    #[tokio::test]
    async fn failed_judgements_skip_only_that_result() {
        let llm = ScriptedModel::with_override(|kind, context| {
            (kind == PromptKind::Relevance && context.contains("/0\n"))
                .then(|| Err(LLMError::EmptyResponse))
        });
        let search = StubSearch::new(2);
        let evaluated = search_and_evaluate(&llm, &search, "solar", &[], Model::GPT4oMini)
            .await
            .unwrap();
        assert_eq!(evaluated.relevant_results.len(), 1);
        assert_eq!(evaluated.relevant_results[0].url, "https://example.com/solar/1");
        assert_eq!(evaluated.usage, STUB_USAGE);
    }

    #[tokio::test]
    async fn empty_query_yields_empty_results() {
        let llm = ScriptedModel::new();
        let search = StubSearch::new(2);
        let evaluated = search_and_evaluate(&llm, &search, "", &[], Model::GPT4oMini)
            .await
            .unwrap();
        assert!(evaluated.relevant_results.is_empty());
        assert!(evaluated.usage.is_empty());
        assert!(llm.requests_of(PromptKind::Relevance).is_empty());
    }

    #[tokio::test]
    async fn search_errors_propagate() {
        let llm = ScriptedModel::new();
        let search = StubSearch::failing();
        let result = search_and_evaluate(&llm, &search, "solar", &[], Model::GPT4oMini).await;
        assert!(matches!(result, Err(SearchError::QuotaExceeded)));
    }
}
