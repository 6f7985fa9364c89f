//! Anthropic Messages adapter for resume feedback.
//!
//! One request per analysis: the system prompt pins the reply to bare JSON and
//! the user turn carries the resume text and the feedback prompt as separate
//! content blocks. Rate limits, 5xx replies and connection failures are retried
//! with exponential backoff (or the server's `retry-after`); anything else fails
//! the analysis straight away.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::prompts::FEEDBACK_SYSTEM;
use super::{
    ContentPart, FeedbackResponse, InferenceClient, InferenceError, MessageContent,
    ResponseMessage,
};
use crate::storage::FileStorage;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Model used for every analysis. Hardcoded so scores stay comparable.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_FEEDBACK_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff * 2u32.pow(attempt.saturating_sub(1)))
    }
}

#[derive(Debug, Serialize)]
struct FeedbackRequest {
    model: &'static str,
    max_tokens: u32,
    system: &'static str,
    messages: Vec<UserTurn>,
}

#[derive(Debug, Serialize)]
struct UserTurn {
    role: &'static str,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextBlock {
    fn new(text: String) -> Self {
        Self { kind: "text", text }
    }
}

impl FeedbackRequest {
    fn for_resume(resume_text: &str, prompt: &str) -> Self {
        Self {
            model: MODEL,
            max_tokens: MAX_FEEDBACK_TOKENS,
            system: FEEDBACK_SYSTEM,
            messages: vec![UserTurn {
                role: "user",
                content: vec![
                    TextBlock::new(format!("<resume>\n{}\n</resume>", resume_text.trim())),
                    TextBlock::new(prompt.to_string()),
                ],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    role: String,
    content: Vec<ContentPart>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: ReplyUsage,
}

#[derive(Debug, Deserialize)]
struct ReplyUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesReply {
    /// Keeps the text blocks. A reply cut off at the token limit cannot hold
    /// complete feedback JSON and is rejected here.
    fn into_feedback(self) -> Result<FeedbackResponse, InferenceError> {
        if self.stop_reason.as_deref() == Some("max_tokens") {
            return Err(InferenceError::Truncated {
                output_tokens: self.usage.output_tokens,
            });
        }
        let parts = self
            .content
            .into_iter()
            .filter(|part| part.kind.as_deref() == Some("text"))
            .collect();
        Ok(FeedbackResponse {
            message: ResponseMessage {
                role: self.role,
                content: MessageContent::Parts(parts),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorReply {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorReply>(&body)
        .map(|reply| reply.error.message)
        .unwrap_or(body)
}

/// Server-requested delay, capped so a bad header cannot stall a job.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

enum Attempt {
    Done(MessagesReply),
    Retry {
        error: InferenceError,
        after: Option<Duration>,
    },
}

/// Anthropic-backed inference. Reads the stored resume, extracts its text and
/// asks the model for feedback on it.
pub struct AnthropicInference {
    http: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
    storage: Arc<dyn FileStorage>,
}

impl AnthropicInference {
    pub fn new(api_key: String, storage: Arc<dyn FileStorage>) -> Result<Self, InferenceError> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            endpoint: MESSAGES_URL.to_string(),
            retry: RetryPolicy::default(),
            storage,
        })
    }

    async fn resume_text(&self, path: &str) -> Result<String, InferenceError> {
        let document = self.storage.download(path).await?;

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
            .await
            .map_err(|e| InferenceError::Extract(e.to_string()))?
            .map_err(|e| InferenceError::Extract(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(InferenceError::Extract(
                "document contains no extractable text".to_string(),
            ));
        }
        debug!("Extracted {} chars of resume text from {path}", text.len());
        Ok(text)
    }

    async fn request_feedback(
        &self,
        request: &FeedbackRequest,
    ) -> Result<MessagesReply, InferenceError> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await? {
                Attempt::Done(reply) => return Ok(reply),
                Attempt::Retry { error, .. } if attempt >= self.retry.max_retries => {
                    return Err(error)
                }
                Attempt::Retry { error, after } => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt, after);
                    warn!(
                        "Feedback request failed ({error}), retry {attempt}/{} in {}ms",
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn send_once(&self, request: &FeedbackRequest) -> Result<Attempt, InferenceError> {
        let sent = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Ok(Attempt::Retry {
                    error: InferenceError::Http(e),
                    after: None,
                })
            }
            Err(e) => return Err(InferenceError::Http(e)),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(Attempt::Done(response.json().await?));
        }

        let after = retry_after(response.headers());
        let message = api_error_message(response.text().await.unwrap_or_default());
        match status {
            StatusCode::TOO_MANY_REQUESTS => Ok(Attempt::Retry {
                error: InferenceError::RateLimited(message),
                after,
            }),
            s if s.is_server_error() => Ok(Attempt::Retry {
                error: InferenceError::Api {
                    status: s.as_u16(),
                    message,
                },
                after,
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(InferenceError::Auth(message)),
            s => Err(InferenceError::Api {
                status: s.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl InferenceClient for AnthropicInference {
    async fn feedback(&self, path: &str, prompt: &str) -> Result<FeedbackResponse, InferenceError> {
        let resume_text = self.resume_text(path).await?;
        let reply = self
            .request_feedback(&FeedbackRequest::for_resume(&resume_text, prompt))
            .await?;
        debug!(
            "Feedback reply: input_tokens={}, output_tokens={}",
            reply.usage.input_tokens, reply.usage.output_tokens
        );
        reply.into_feedback()
    }
}
