use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use thiserror::Error;

static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w*)\n([\s\S]*?)\n```").expect("code block regex is valid"));

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]|\d+[.)])\s+").expect("list marker regex is valid")
});

#[derive(Error, Debug)]
pub enum ParseJsonError {
    #[error("No matching markdown code blocks found in response: {0}")]
    NoMatchingMarkdownCodeBlocksFound(String),
    #[error("Failed to parse JSON: {0}")]
    ParseJsonError(#[from] serde_json::Error),
}

pub fn parse_markdown_code_block(
    content: &str,
    language: Option<&str>,
) -> Result<String, ParseJsonError> {
    let mut valid_results = Vec::new();
    for cap in CODE_BLOCK_RE.captures_iter(content) {
        let block_language = cap.get(1).map_or("", |m| m.as_str());
        let parsed_content = cap.get(2).map_or("", |m| m.as_str()).trim();

        match language {
            None => return Ok(parsed_content.to_string()),
            Some(language) if block_language == language => {
                valid_results.push(parsed_content.to_string())
            }
            Some(_) => {}
        }
    }
    valid_results
        .pop()
        .ok_or_else(|| ParseJsonError::NoMatchingMarkdownCodeBlocksFound(content.to_string()))
}

/// Parses a model answer as JSON. JSON-mode answers are bare objects; models
/// that ignore JSON mode usually wrap the object in a ```json block.
pub fn parse_json_response<T: DeserializeOwned>(completion: &str) -> Result<T, ParseJsonError> {
    let trimmed = completion.trim();
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }
    let json_string = parse_markdown_code_block(trimmed, Some("json"))?;
    let parsed = serde_json::from_str(&json_string)?;
    Ok(parsed)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strips a leading bullet or ordinal (`- `, `* `, `1. `, `2) `) from a line.
pub fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}
