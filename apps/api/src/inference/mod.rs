//! Inference — asks the model for structured feedback on a stored resume.
//!
//! Responses arrive either as a plain string or as a list of content parts.
//! `MessageContent::text` is the one place that shape is normalized.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::analysis::Feedback;
use crate::storage::StorageError;

pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicInference;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("could not read stored resume: {0}")]
    Storage(#[from] StorageError),

    #[error("could not extract resume text: {0}")]
    Extract(String),

    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("inference API rejected the credentials: {0}")]
    Auth(String),

    #[error("rate limited by the inference API: {0}")]
    RateLimited(String),

    #[error("feedback was cut off after {output_tokens} tokens")]
    Truncated { output_tokens: u32 },
}

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("inference response carried no text")]
    EmptyContent,

    #[error("feedback is not valid JSON in the expected format: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageContent {
    /// The response text: the string itself, or the first part's text.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(parts) => parts.first().and_then(|p| p.text.as_deref()),
        }
    }
}

/// Extracts the response text and parses it as `Feedback`.
pub fn parse_feedback(response: &FeedbackResponse) -> Result<Feedback, FeedbackParseError> {
    let text = response
        .message
        .content
        .text()
        .ok_or(FeedbackParseError::EmptyContent)?;
    Ok(serde_json::from_str(unfence(text))?)
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Requests feedback on the document stored at `path`.
    async fn feedback(&self, path: &str, prompt: &str) -> Result<FeedbackResponse, InferenceError>;
}

/// Drops a surrounding code fence (with or without a `json` tag) if the model
/// added one despite being told not to.
fn unfence(text: &str) -> &str {
    let text = text.trim();
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
