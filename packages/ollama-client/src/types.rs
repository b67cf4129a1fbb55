//! Ollama API request and response types.

use serde::{Deserialize, Serialize};

/// Default context window (16k tokens).
pub const DEFAULT_NUM_CTX: u32 = 2048 * 8;

// =============================================================================
// Messages
// =============================================================================

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// =============================================================================
// Structured Output
// =============================================================================

/// Sampling options forwarded to the model runner.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOptions {
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Context window size in tokens
    pub num_ctx: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            num_ctx: DEFAULT_NUM_CTX,
        }
    }
}

/// Chat request whose answer is constrained by a JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredRequest {
    /// Model to use (e.g., "gemma3:27b")
    pub model: String,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Always false; the client reads one complete answer.
    pub stream: bool,

    /// JSON schema the answer must satisfy
    pub format: serde_json::Value,

    /// Sampling options
    pub options: ModelOptions,
}

impl StructuredRequest {
    /// Create a single-turn structured request.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            stream: false,
            format: serde_json::Value::Null,
            options: ModelOptions::default(),
        }
    }

    /// Prepend a system message.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(system));
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    /// Set context window size.
    pub fn num_ctx(mut self, num_ctx: u32) -> Self {
        self.options.num_ctx = num_ctx;
        self
    }

    /// Set the schema constraint.
    pub(crate) fn with_format(mut self, format: serde_json::Value) -> Self {
        self.format = format;
        self
    }
}

/// Raw chat response from `/api/chat` (for internal parsing).
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub message: ChatMessageResponse,

    #[serde(default)]
    pub eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_request_serialization() {
        let request = StructuredRequest::new("gemma3:27b", "Is this relevant?")
            .system("Answer in JSON")
            .temperature(0.2)
            .with_format(serde_json::json!({"type": "object"}));

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gemma3:27b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["format"]["type"], "object");
        assert_eq!(json["options"]["num_ctx"], DEFAULT_NUM_CTX);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{
            "model": "gemma3:27b",
            "message": {"role": "assistant", "content": "{\"is_relevant\": true}"},
            "done": true,
            "eval_count": 12
        }"#;

        let parsed: ChatResponseRaw = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "{\"is_relevant\": true}");
        assert_eq!(parsed.eval_count, Some(12));
    }
}
