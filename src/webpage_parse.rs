use crate::search::SearchResult;
use crate::utils::normalize_whitespace;
use ammonia::Builder;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(text: String, metadata: DocumentMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            metadata,
        }
    }
}

/// Downloads a search result and turns it into plain text. `None` means the
/// source should be skipped; it is never an error for the caller.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_and_parse_content(&self, result: &SearchResult) -> Option<Document>;
}

#[derive(Error, Debug)]
pub enum WebpageParseError {
    #[error("Failed to fetch webpage: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("Webpage returned status {0}")]
    StatusError(u16),
    #[error("Failed to extract PDF text: {0}")]
    PdfError(String),
    #[error("Webpage has no text content")]
    EmptyContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWebpage {
    pub title: Option<String>,
    pub author: Option<String>,
    pub content: String,
}

pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, WebpageParseError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(timeout)
            .build()
            .map_err(WebpageParseError::FetchError)?;
        Ok(Self { client })
    }

    pub async fn visit_and_parse_webpage(
        &self,
        url: &str,
    ) -> Result<ParsedWebpage, WebpageParseError> {
        let response = self.client.get(url)
            .header("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf;q=0.8,*/*;q=0.7")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36")
            .send()
            .await
            .map_err(WebpageParseError::FetchError)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebpageParseError::StatusError(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let parsed = if is_pdf(&content_type, url) {
            let bytes = response.bytes().await.map_err(WebpageParseError::FetchError)?;
            let text = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| WebpageParseError::PdfError(e.to_string()))
            })
            .await
            .map_err(|e| WebpageParseError::PdfError(e.to_string()))??;
            ParsedWebpage {
                title: None,
                author: None,
                content: normalize_whitespace(&text),
            }
        } else {
            let webpage_text = response.text().await.map_err(WebpageParseError::FetchError)?;
            dom_parse_webpage(&webpage_text)
        };

        if parsed.content.is_empty() {
            return Err(WebpageParseError::EmptyContent);
        }
        Ok(parsed)
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_and_parse_content(&self, result: &SearchResult) -> Option<Document> {
        match self.visit_and_parse_webpage(&result.url).await {
            Ok(parsed) => {
                let title = if result.title.trim().is_empty() {
                    parsed.title.unwrap_or_default()
                } else {
                    result.title.clone()
                };
                Some(Document::new(
                    parsed.content,
                    DocumentMetadata {
                        title,
                        url: result.url.clone(),
                        published_at: result.published_at.clone(),
                        author: parsed.author,
                    },
                ))
            }
            Err(e) => {
                tracing::warn!(url = %result.url, error = %e, "skipping source");
                None
            }
        }
    }
}

fn is_pdf(content_type: &str, url: &str) -> bool {
    if content_type.contains("application/pdf") {
        return true;
    }
    url::Url::parse(url)
        .map(|parsed| parsed.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

const UNWRAPPED_TAGS: [&str; 6] = ["img", "nav", "footer", "header", "aside", "figure"];
const CONTENT_STRIPPED_TAGS: [&str; 11] = [
    "script", "style", "noscript", "iframe", "svg", "canvas", "template", "nav", "footer",
    "header", "aside",
];

fn dom_parse_webpage(webpage_text: &str) -> ParsedWebpage {
    let document = Html::parse_document(webpage_text);
    let title = select_text(&document, "title");
    let author = Selector::parse(r#"meta[name="author"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("content"))
                .map(normalize_whitespace)
        })
        .filter(|author| !author.is_empty());

    let clean_html = Builder::new()
        .rm_tags(UNWRAPPED_TAGS)
        .add_clean_content_tags(CONTENT_STRIPPED_TAGS)
        .strip_comments(true)
        .clean(webpage_text)
        .to_string();

    // The sanitized fragment keeps only text-bearing markup; reading its text
    // nodes drops link targets along with the tags.
    let fragment = Html::parse_fragment(&clean_html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");

    ParsedWebpage {
        title,
        author,
        content: normalize_whitespace(&text),
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| normalize_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}
