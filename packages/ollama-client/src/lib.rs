//! Ollama REST client for structured output
//!
//! A minimal client for a local or remote Ollama server with no domain logic.
//! It exposes one capability: send a prompt together with a JSON schema and
//! get back a typed answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use ollama_client::{OllamaClient, StructuredRequest};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Verdict {
//!     is_relevant: bool,
//! }
//!
//! let client = OllamaClient::new("http://127.0.0.1:11434");
//! let verdict: Verdict = client
//!     .extract(StructuredRequest::new("gemma3:27b", "Is this page about pizza?"))
//!     .await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{OllamaError, Result};
pub use schema::StructuredOutput;
pub use types::*;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

/// Default address of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Ollama API client.
#[derive(Clone)]
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl OllamaClient {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OllamaError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Type-safe structured output.
    ///
    /// Derives the schema from `T`, sends it as the `format` constraint and
    /// deserializes the model's answer into `T`.
    pub async fn extract<T: StructuredOutput>(&self, request: StructuredRequest) -> Result<T> {
        let schema = T::format_schema();

        debug!(
            type_name = T::type_name(),
            model = %request.model,
            "Requesting structured output"
        );

        let content = self.structured_output(request.with_format(schema)).await?;

        serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
            OllamaError::Parse(format!(
                "Failed to deserialize {}: {}",
                T::type_name(),
                e
            ))
        })
    }

    /// Structured output, returning the raw JSON text of the answer.
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Ollama request failed");
                OllamaError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Ollama API error");
            return Err(OllamaError::Api(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OllamaError::Parse(e.to_string()))?;

        debug!(
            model = %request.model,
            eval_count = ?chat_response.eval_count,
            duration_ms = start.elapsed().as_millis(),
            "Ollama structured output"
        );

        Ok(chat_response.message.content)
    }
}

/// Some models wrap JSON in a markdown fence even when constrained.
fn strip_code_fence(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = OllamaClient::new("http://gpu-box:11434/");
        assert_eq!(client.base_url(), "http://gpu-box:11434");

        let client = OllamaClient::default();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_with_timeout() {
        let client = OllamaClient::default()
            .with_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = OllamaClient::new("http://127.0.0.1:1")
            .with_timeout(Duration::from_millis(500))
            .unwrap();

        let result = client
            .structured_output(StructuredRequest::new("gemma3:27b", "hello"))
            .await;

        match result {
            Err(e) => assert!(e.is_transient()),
            Ok(_) => panic!("expected a network error"),
        }
    }
}
