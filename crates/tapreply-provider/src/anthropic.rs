use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{Completion, CompletionRequest, LlmProvider, DEFAULT_TIMEOUT_SECS};

const API_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            408 => Self::Timeout,
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_key, api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// `timeout` bounds the whole HTTP exchange, connect through body.
    pub fn with_timeout(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

impl From<CompletionRequest> for MessagesBody {
    fn from(request: CompletionRequest) -> Self {
        Self {
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![MessageTurn {
                role: "user",
                content: request.prompt,
            }],
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = MessagesBody::from(request);

        let sent = self
            .client
            .post(self.messages_url())
            .header("anthropic-version", API_VERSION)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "anthropic api error (timeout): no response within {:?}",
                    self.timeout
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("anthropic api error (connect): {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(describe_failure(status, serde_json::from_str(&raw).ok()));
        }

        let reply: MessagesReply = resp.json().await?;
        Ok(reply.into_completion())
    }
}

fn describe_failure(status: StatusCode, body: Option<ErrorBody>) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status).as_str();
    match body {
        Some(ErrorBody { error }) => anyhow!(
            "anthropic api error ({status}) [{kind}]: {} ({})",
            error.message,
            error.kind
        ),
        None => anyhow!("anthropic api error ({status}) [{kind}]"),
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<MessageTurn>,
}

#[derive(Debug, Serialize)]
struct MessageTurn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl MessagesReply {
    /// Joins the text blocks; other block types are ignored.
    fn into_completion(self) -> Completion {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        Completion {
            text,
            output_tokens: self.usage.map(|u| u.output_tokens),
            stop_reason: self.stop_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}
