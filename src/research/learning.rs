use crate::llm::{generate_object, LLMError, LanguageModel, Model, TokenUsage};
use crate::prompts::{build_learning_context, Prompt, LEARNING_SYSTEM_PROMPT};
use crate::research::Learning;
use crate::utils::truncate_chars;
use crate::webpage_parse::Document;
use serde::Deserialize;

pub const MAX_DOCUMENT_CHARS: usize = 8000;
pub const MAX_FOLLOW_UP_QUESTIONS: usize = 3;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LearningResponse {
    learning: String,
    #[serde(default)]
    follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedLearning {
    pub learning: Learning,
    pub usage: TokenUsage,
}

pub async fn extract_learning(
    llm: &dyn LanguageModel,
    query: &str,
    document: &Document,
    model: Model,
) -> Result<ExtractedLearning, LLMError> {
    let prompt = Prompt::new(
        LEARNING_SYSTEM_PROMPT.to_string(),
        build_learning_context(
            query,
            &document.metadata.title,
            &document.metadata.url,
            truncate_chars(&document.text, MAX_DOCUMENT_CHARS),
        ),
    );
    let response = generate_object::<LearningResponse>(llm, model, prompt).await?;
    let follow_up_questions = response
        .value
        .follow_up_questions
        .into_iter()
        .map(|question| question.trim().to_string())
        .filter(|question| !question.is_empty())
        .take(MAX_FOLLOW_UP_QUESTIONS)
        .collect();
    Ok(ExtractedLearning {
        learning: Learning {
            query: query.to_string(),
            url: document.metadata.url.clone(),
            learning: response.value.learning.trim().to_string(),
            follow_up_questions,
        },
        usage: response.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::testing::{section, PromptKind, ScriptedModel, STUB_USAGE};
    use crate::webpage_parse::DocumentMetadata;

    fn document(text: String) -> Document {
        Document::new(
            text,
            DocumentMetadata {
                title: "Solar report".to_string(),
                url: "https://a.com/solar".to_string(),
                published_at: None,
                author: None,
            },
        )
    }

    #[tokio::test]
    async fn wraps_answer_with_query_and_url() {
        let llm = ScriptedModel::new();
        let extracted = extract_learning(
            &llm,
            "solar costs",
            &document("Panels got cheaper.".to_string()),
            Model::GPT4oMini,
        )
        .await
        .unwrap();
        assert_eq!(extracted.learning.query, "solar costs");
        assert_eq!(extracted.learning.url, "https://a.com/solar");
        assert_eq!(extracted.learning.learning, "Learned about solar costs.");
        assert_eq!(
            extracted.learning.follow_up_questions,
            vec!["What follows from solar costs?"]
        );
        assert_eq!(extracted.usage, STUB_USAGE);
    }

    #[tokio::test]
    async fn long_documents_are_truncated() {
        let llm = ScriptedModel::new();
        let text = "a".repeat(MAX_DOCUMENT_CHARS) + "OVERFLOW";
        extract_learning(&llm, "q", &document(text), Model::GPT4oMini)
            .await
            .unwrap();
        let request = &llm.requests_of(PromptKind::Learning)[0];
        let context = &request.messages[1].content;
        assert!(!context.contains("OVERFLOW"));
        assert!(context.contains(&"a".repeat(MAX_DOCUMENT_CHARS)));
    }

    #[tokio::test]
    async fn follow_up_questions_are_capped() {
        let llm = ScriptedModel::with_override(|kind, context| {
            (kind == PromptKind::Learning).then(|| {
                assert_eq!(section(context, "Search query"), "q");
                Ok(serde_json::json!({
                    "learning": " One fact. ",
                    "followUpQuestions": ["a?", " ", "b?", "c?", "d?"]
                })
                .to_string())
            })
        });
        let extracted = extract_learning(&llm, "q", &document("text".to_string()), Model::GPT4oMini)
            .await
            .unwrap();
        assert_eq!(extracted.learning.learning, "One fact.");
        assert_eq!(extracted.learning.follow_up_questions, vec!["a?", "b?", "c?"]);
    }

    #[tokio::test]
    async fn malformed_answer_is_an_error() {
        let llm = ScriptedModel::with_override(|kind, _| {
            (kind == PromptKind::Learning).then(|| Ok("{\"summary\": 1}".to_string()))
        });
        let result = extract_learning(&llm, "q", &document("text".to_string()), Model::GPT4oMini).await;
        assert!(matches!(result, Err(LLMError::ParseError(_))));
    }
}
