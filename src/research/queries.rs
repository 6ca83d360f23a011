use crate::llm::{CompletionBuilder, LLMError, LanguageModel, Model, TokenUsage};
use crate::prompts::{
    build_refine_query_context, build_sub_queries_context, Prompt, REFINE_QUERY_SYSTEM_PROMPT,
    SUB_QUERIES_SYSTEM_PROMPT,
};
use crate::utils::strip_list_marker;

const REFINED_QUERY_MAX_TOKENS: u32 = 50;

#[derive(Debug, Clone)]
pub struct SubQueries {
    pub queries: Vec<String>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct RefinedQuery {
    pub refined_query: String,
    pub usage: TokenUsage,
}

/// Splits `query` into roughly `breadth` search-ready queries. The model is
/// not held to the exact count.
pub async fn generate_sub_queries(
    llm: &dyn LanguageModel,
    query: &str,
    breadth: usize,
    model: Model,
) -> Result<SubQueries, LLMError> {
    let prompt = Prompt::new(
        SUB_QUERIES_SYSTEM_PROMPT.to_string(),
        build_sub_queries_context(query, breadth),
    );
    let completion = CompletionBuilder::new()
        .model(model)
        .messages(prompt.build_messages())
        .temperature(0.7)
        .build(llm)
        .await?;
    let queries = completion
        .content
        .lines()
        .map(|line| strip_list_marker(line.trim()).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();
    tracing::debug!(requested = breadth, generated = queries.len(), "generated sub-queries");
    Ok(SubQueries {
        queries,
        usage: completion.usage,
    })
}

pub async fn refine_query(
    llm: &dyn LanguageModel,
    initial_query: &str,
    sub_query: &str,
    model: Model,
) -> Result<RefinedQuery, LLMError> {
    let prompt = Prompt::new(
        REFINE_QUERY_SYSTEM_PROMPT.to_string(),
        build_refine_query_context(initial_query, sub_query),
    );
    let result = CompletionBuilder::new()
        .model(model)
        .messages(prompt.build_messages())
        .temperature(0.0)
        .max_completion_tokens(REFINED_QUERY_MAX_TOKENS)
        .build(llm)
        .await;
    match result {
        Ok(completion) => Ok(RefinedQuery {
            refined_query: completion.content.trim().to_string(),
            usage: completion.usage,
        }),
        // An empty refinement is passed on; searching it yields no results.
        Err(LLMError::EmptyResponse) => Ok(RefinedQuery {
            refined_query: String::new(),
            usage: TokenUsage::default(),
        }),
        Err(e) => Err(e),
    }
}
