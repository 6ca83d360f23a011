use crate::prompts::Prompt;
use crate::utils::parse_json_response;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use thiserror::Error;
pub mod gemini;
pub mod openai;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Google,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "openai:gpt-4o-mini")]
    GPT4oMini,
    #[serde(rename = "google:gemini-1.5-flash-latest")]
    Gemini15FlashLatest,
    #[serde(rename = "google:gemini-1.5-pro-latest")]
    Gemini15ProLatest,
}

impl Model {
    pub const ALL: [Model; 3] = [
        Model::GPT4oMini,
        Model::Gemini15FlashLatest,
        Model::Gemini15ProLatest,
    ];

    pub fn provider(&self) -> Provider {
        match self {
            Model::GPT4oMini => Provider::OpenAI,
            Model::Gemini15FlashLatest | Model::Gemini15ProLatest => Provider::Google,
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            Model::GPT4oMini => "openai:gpt-4o-mini",
            Model::Gemini15FlashLatest => "google:gemini-1.5-flash-latest",
            Model::Gemini15ProLatest => "google:gemini-1.5-pro-latest",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::GPT4oMini => write!(f, "gpt-4o-mini"),
            Model::Gemini15FlashLatest => write!(f, "gemini-1.5-flash-latest"),
            Model::Gemini15ProLatest => write!(f, "gemini-1.5-pro-latest"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: Model,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_completion_tokens: Option<u32>,
    pub json_response: bool,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct StructuredCompletion<T> {
    pub value: T,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LLMError>;
}

#[derive(Debug, Clone, Default)]
pub struct ProviderClient {
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LanguageModel for ProviderClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LLMError> {
        tracing::debug!(model = request.model.identifier(), "sending completion request");
        match request.model.provider() {
            Provider::OpenAI => openai::completion_openai(&self.client, &request).await,
            Provider::Google => gemini::completion_gemini(&self.client, &request).await,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionBuilder {
    model: Option<Model>,
    messages: Vec<Message>,
    temperature: Option<f64>,
    max_completion_tokens: Option<u32>,
    json_response: bool,
}

impl CompletionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_completion_tokens(mut self, tokens: u32) -> Self {
        self.max_completion_tokens = Some(tokens);
        self
    }

    pub fn json_response(mut self, json_response: bool) -> Self {
        self.json_response = json_response;
        self
    }

    pub fn request(self) -> Result<CompletionRequest, LLMError> {
        let model = match self.model {
            Some(m) => m,
            None => return Err(LLMError::RequestBuildingError("model is required".to_string())),
        };
        if self.messages.is_empty() {
            return Err(LLMError::RequestBuildingError(
                "at least one message is required".to_string(),
            ));
        }
        Ok(CompletionRequest {
            model,
            messages: self.messages,
            temperature: self.temperature.unwrap_or(0.0),
            max_completion_tokens: self.max_completion_tokens,
            json_response: self.json_response,
        })
    }

    pub async fn build(self, llm: &dyn LanguageModel) -> Result<Completion, LLMError> {
        let request = self.request()?;
        llm.complete(request).await
    }
}

pub async fn generate_object<T: DeserializeOwned>(
    llm: &dyn LanguageModel,
    model: Model,
    prompt: Prompt,
) -> Result<StructuredCompletion<T>, LLMError> {
    let completion = CompletionBuilder::new()
        .model(model)
        .messages(prompt.build_messages())
        .temperature(0.0)
        .json_response(true)
        .build(llm)
        .await?;
    let value: T = parse_json_response(&completion.content)
        .map_err(|e| LLMError::ParseError(e.to_string()))?;
    Ok(StructuredCompletion {
        value,
        usage: completion.usage,
    })
}

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("LLM request building failed: {0}")]
    RequestBuildingError(String),
    #[error("LLM request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("LLM API returned status {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("LLM response is empty")]
    EmptyResponse,
}
