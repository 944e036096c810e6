/// One single-turn completion: the whole prompt goes out as a single user
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 200,
            temperature: 0.6,
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
}

/// Free text returned by the model, text blocks joined with newlines.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub output_tokens: Option<u32>,
    pub stop_reason: Option<String>,
}
