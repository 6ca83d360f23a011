use crate::llm::{Completion, CompletionRequest, LLMError, Role, TokenUsage};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::env;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: GeminiPart,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    // Absent when the answer was blocked.
    #[serde(default)]
    content: GeminiResponseContent,
}

#[derive(Deserialize, Default)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

pub(crate) async fn completion_gemini(
    client: &reqwest::Client,
    request: &CompletionRequest,
) -> Result<Completion, LLMError> {
    let mut contents = Vec::new();
    let mut system_content = None;

    for msg in &request.messages {
        match msg.role {
            Role::System => {
                system_content = Some(msg.content.clone());
            }
            Role::User | Role::Assistant => {
                let role = match msg.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                contents.push(GeminiContent {
                    parts: vec![GeminiPart {
                        text: msg.content.clone(),
                    }],
                    role: Some(role.to_string()),
                });
            }
        }
    }

    let req_body = GeminiRequest {
        contents,
        generation_config: GeminiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_completion_tokens,
            response_mime_type: request.json_response.then_some("application/json"),
        },
        system_instruction: system_content.map(|content| GeminiSystemInstruction {
            parts: GeminiPart { text: content },
        }),
    };

    let api_key = match env::var("GOOGLE_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            return Err(LLMError::RequestBuildingError(
                "GOOGLE_API_KEY environment variable not set".to_string(),
            ))
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let url = format!(
        "{GEMINI_API_URL}/{}:generateContent?key={api_key}",
        request.model
    );

    let response = client
        .post(url)
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
        return Err(LLMError::ApiError {
            status: status.as_u16(),
            message: error_text,
        });
    }

    let response_body: GeminiResponse = response.json().await.map_err(LLMError::RequestError)?;
    into_completion(response_body)
}

fn into_completion(response_body: GeminiResponse) -> Result<Completion, LLMError> {
    let usage = response_body
        .usage_metadata
        .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    let text = response_body
        .candidates
        .first()
        .map(|candidate| {
            candidate
                .content
                .parts
                .iter()
                .map(|part| part.text.as_str())
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
        .ok_or(LLMError::EmptyResponse)?;

    Ok(Completion {
        content: text,
        usage,
    })
}
