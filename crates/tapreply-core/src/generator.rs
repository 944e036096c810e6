use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tapreply_provider::{CompletionRequest, LlmProvider};
use tracing::debug;

/// Everything the generator may use to propose replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub utterance: String,
    pub context: String,
    /// Exact number of candidates wanted.
    pub candidate_count: usize,
    /// Rendered recent exchanges, when the deployment is history-aware.
    pub history: Option<String>,
    /// Replies users have chosen before in this context.
    pub worked_replies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorFailure {
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("generator timed out after {0:?}")]
    Timeout(Duration),
    #[error("generator produced {got} usable replies, {needed} required")]
    InvalidOutput { got: usize, needed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorOutcome {
    Candidates(Vec<String>),
    Failure(GeneratorFailure),
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Single attempt; never retries.
    async fn generate(&self, request: &GenerationRequest) -> GeneratorOutcome;
}

/// Stands in when no credential is configured. Every call fails, which sends
/// the engine down the phrase-bank path.
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for UnavailableGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> GeneratorOutcome {
        GeneratorOutcome::Failure(GeneratorFailure::Unavailable(self.reason.clone()))
    }
}

/// Generator backed by a completion provider.
pub struct LlmReplyGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl LlmReplyGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 200,
            temperature: 0.6,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ReplyGenerator for LlmReplyGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorOutcome {
        let completion_request = CompletionRequest::new(self.model.clone(), build_prompt(request))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let call = self.provider.complete(completion_request);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => return GeneratorOutcome::Failure(GeneratorFailure::Timeout(self.timeout)),
            Ok(Err(error)) => {
                return GeneratorOutcome::Failure(GeneratorFailure::Unavailable(error.to_string()))
            }
            Ok(Ok(response)) => response,
        };

        debug!(
            output_tokens = ?response.output_tokens,
            chars = response.text.len(),
            "generator responded"
        );
        parse_candidates(&response.text, request.candidate_count)
    }
}

/// Prompt asking for exactly `candidate_count` tap-to-speak replies.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let count = request.candidate_count;
    let mut prompt = format!(
        "Generate exactly {count} short reply options for a user to tap.\n\
         \n\
         Rules:\n\
         - Each reply under 18 words\n\
         - Polite and neutral\n\
         - No emojis\n\
         - No numbering or bullets\n\
         - One reply per line\n"
    );

    let history = request.history.as_deref().filter(|h| !h.trim().is_empty());
    if history.is_some() || !request.worked_replies.is_empty() {
        prompt.push_str("- Stay consistent with the conversation so far\n");
    }

    prompt.push_str(&format!("\nContext: {}\n", request.context));

    if let Some(history) = history {
        prompt.push_str("\nConversation so far:\n");
        prompt.push_str(history);
        prompt.push('\n');
    }

    if !request.worked_replies.is_empty() {
        prompt.push_str("\nReplies this user has chosen before in this context:\n");
        for reply in &request.worked_replies {
            prompt.push_str(&format!("- {reply}\n"));
        }
    }

    prompt.push_str(&format!("\nMessage: \"{}\"\n", request.utterance));
    prompt
}

fn is_list_marker(c: char) -> bool {
    c == '-' || c == '•' || c == '.' || c == ' ' || c.is_ascii_digit()
}

/// Splits raw model output into reply lines, stripping bullets and numbering.
/// Fewer than `needed` usable lines is a failure; extra lines are dropped.
pub fn parse_candidates(raw: &str, needed: usize) -> GeneratorOutcome {
    let lines: Vec<String> = raw
        .lines()
        .map(|line| line.trim().trim_start_matches(is_list_marker).trim())
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    if lines.len() < needed {
        return GeneratorOutcome::Failure(GeneratorFailure::InvalidOutput {
            got: lines.len(),
            needed,
        });
    }

    GeneratorOutcome::Candidates(lines.into_iter().take(needed).collect())
}
