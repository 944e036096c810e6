use std::fmt;

use serde::{Deserialize, Serialize};

/// Context label used when a request does not name one.
pub const DEFAULT_CONTEXT: &str = "generic";

/// Fine-grained purpose of a heard utterance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Emergency,
    Directions,
    Payment,
    Clarify,
    Generic,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Emergency,
        Intent::Directions,
        Intent::Payment,
        Intent::Clarify,
        Intent::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Directions => "directions",
            Self::Payment => "payment",
            Self::Clarify => "clarify",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_context() -> Option<String> {
    Some(DEFAULT_CONTEXT.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub session_id: String,
    pub last_text: String,
    #[serde(default = "default_context")]
    pub context: Option<String>,
    /// Accepted for client compatibility; suggestion behaviour is chosen by configuration.
    #[serde(default)]
    pub mode: Option<String>,
}

impl SuggestRequest {
    pub fn new(session_id: impl Into<String>, last_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            last_text: last_text.into(),
            context: default_context(),
            mode: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The declared context, falling back to [`DEFAULT_CONTEXT`] when absent or blank.
    pub fn context_or_default(&self) -> &str {
        match self.context.as_deref() {
            Some(ctx) if !ctx.is_empty() => ctx,
            _ => DEFAULT_CONTEXT,
        }
    }
}

/// One tap-to-speak candidate returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    /// `<context>:<intent>:<rank-index>`
    pub id: String,
    pub text: String,
    pub intent: Intent,
    pub score: f64,
}

impl Suggestion {
    pub fn make_id(context: &str, intent: Intent, rank: usize) -> String {
        format!("{context}:{intent}:{rank}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogChoiceRequest {
    pub session_id: String,
    /// Echoed by clients; not used for weighting.
    #[serde(default)]
    pub suggestion_id: String,
    pub context: String,
    pub intent: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearHistoryRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
