use crate::llm::{Completion, CompletionRequest, LLMError, Message, TokenUsage};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::env;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: String,
    messages: &'a [Message],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorBody,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

pub(crate) async fn completion_openai(
    client: &reqwest::Client,
    request: &CompletionRequest,
) -> Result<Completion, LLMError> {
    let req_body = OpenAIRequest {
        model: request.model.to_string(),
        messages: &request.messages,
        temperature: request.temperature,
        max_tokens: request.max_completion_tokens,
        response_format: request.json_response.then_some(OpenAIResponseFormat {
            r#type: "json_object",
        }),
    };

    let api_key = match env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            return Err(LLMError::RequestBuildingError(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ))
        }
    };

    let mut headers = HeaderMap::new();
    let auth_header = match HeaderValue::from_str(&format!("Bearer {api_key}")) {
        Ok(header) => header,
        Err(e) => return Err(LLMError::RequestBuildingError(e.to_string())),
    };
    headers.insert(AUTHORIZATION, auth_header);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let response = client
        .post(OPENAI_API_URL)
        .headers(headers)
        .json(&req_body)
        .send()
        .await
        .map_err(LLMError::RequestError)?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let message = serde_json::from_str::<OpenAIErrorResponse>(&error_text)
            .map(|body| body.error.message)
            .unwrap_or(error_text);
        return Err(LLMError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    let response_body: OpenAIResponse = response.json().await.map_err(LLMError::RequestError)?;
    let usage = response_body
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    response_body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| Completion { content, usage })
        .ok_or(LLMError::EmptyResponse)
}
