//! HTTP summarization backend with failure classification and retry.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::{
    config::{BackendDialect, SummarizerConfig},
    error::{SummarizationFailure, SummarizationFailureKind},
    llm::{
        openai::CompletionResponse,
        summarizer::{Summarizer, SummaryResponse},
    },
    retry,
};

pub struct SummarizationBackend {
    client: reqwest::Client,
    config: SummarizerConfig,
}

impl SummarizationBackend {
    const SYSTEM_PROMPT: &str = include_str!("./prompts/system_0.txt");

    pub fn new(config: SummarizerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: SummarizerConfig) -> Self {
        Self { client, config }
    }

    fn request_body(&self, input: &str) -> serde_json::Value {
        match self.config.dialect {
            BackendDialect::ChatCompletions => serde_json::json!({
                "model": self.config.model,
                "max_tokens": self.config.max_output_tokens,
                "messages": [
                    {
                        "role": "system",
                        "content": Self::SYSTEM_PROMPT
                    },
                    {
                        "role": "user",
                        "content": input
                    }
                ]
            }),
            BackendDialect::TextGeneration => serde_json::json!({
                "model": self.config.model,
                "inputs": format!("{}\n\n{input}", Self::SYSTEM_PROMPT.trim()),
                "parameters": {
                    "max_new_tokens": self.config.max_output_tokens,
                    "return_full_text": false
                }
            }),
        }
    }

    #[tracing::instrument(skip(self, input), fields(chars = input.chars().count()))]
    async fn send_once(&self, input: &str, attempt: u32) -> Result<String, SummarizationFailure> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.request_timeout)
            .json(&self.request_body(input))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))
            .map_err(transport_failure)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_failure)?;

        if !status.is_success() {
            let failure = SummarizationFailure::new(
                classify_status(status),
                format!("{status}: {}", error_message(&body).unwrap_or(body)),
            );
            tracing::error!(error = %failure, "Summarizer request failed");
            return Err(failure);
        }

        parse_generation(&body)
    }
}

impl Summarizer for SummarizationBackend {
    async fn summarize(&self, content: &str) -> Result<SummaryResponse, SummarizationFailure> {
        let input = truncate_chars(content, self.config.max_input_chars);
        if input.len() < content.len() {
            tracing::warn!(
                max_input_chars = self.config.max_input_chars,
                "Truncating summarizer input"
            );
        }

        let summary = retry::with_backoff(&self.config.retry, |attempt| {
            self.send_once(input, attempt)
        })
        .await?;

        Ok(SummaryResponse { summary })
    }
}

/// Cuts `text` after `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn classify_status(status: StatusCode) -> SummarizationFailureKind {
    match status.as_u16() {
        401 | 403 => SummarizationFailureKind::Unauthorized,
        402 | 429 => SummarizationFailureKind::QuotaExceeded,
        408 | 500..=599 => SummarizationFailureKind::Transient,
        _ => SummarizationFailureKind::MalformedResponse,
    }
}

fn transport_failure(e: reqwest::Error) -> SummarizationFailure {
    if e.is_decode() {
        SummarizationFailure::malformed(e)
    } else {
        SummarizationFailure::transient(e)
    }
}

/// Every response shape a backend may answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Error(ErrorBody),
    Chat(CompletionResponse),
    Single(GeneratedText),
    List(Vec<GeneratedText>),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(alias = "summary_text")]
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Object { message: String },
}

impl ErrorDetail {
    fn message(self) -> String {
        match self {
            Self::Message(message) | Self::Object { message } => message,
        }
    }
}

/// Extracts the generated text from a 200 response body.
pub fn parse_generation(body: &str) -> Result<String, SummarizationFailure> {
    let parsed: GenerationResponse = serde_json::from_str(body).map_err(|e| {
        SummarizationFailure::malformed(format!("unexpected response shape: {e}"))
    })?;

    let text = match parsed {
        GenerationResponse::Error(err) => {
            let message = err.error.message();
            return Err(SummarizationFailure::new(classify_error_text(&message), message));
        }
        GenerationResponse::Chat(resp) => resp.first_content().map(str::to_string),
        GenerationResponse::Single(generated) => Some(generated.generated_text),
        GenerationResponse::List(list) => list.into_iter().next().map(|g| g.generated_text),
    };

    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SummarizationFailure::malformed("response contained no generated text"))
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message())
}

fn classify_error_text(message: &str) -> SummarizationFailureKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("too many requests")
    {
        SummarizationFailureKind::QuotaExceeded
    } else if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("authorization")
    {
        SummarizationFailureKind::Unauthorized
    } else {
        SummarizationFailureKind::MalformedResponse
    }
}
