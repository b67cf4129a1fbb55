//! Oracle backed by an Ollama server.
//!
//! Relevance and completeness judgements go to the reasoning model; every
//! other call goes to the standard model. Page text is truncated to the
//! per-call budgets in [`crate::limits`] before it is sent.

use async_trait::async_trait;
use ollama_client::{OllamaClient, StructuredOutput, StructuredRequest};
use tracing::debug;

use crate::config::OracleSettings;
use crate::error::Result;
use crate::limits::{
    truncate_chars, MAX_DETECT_SNIPPET, MAX_EXTRACT_SNIPPET, MAX_FILTER_SNIPPET, MAX_SNIPPET_LEN,
};
use crate::oracle::prompts;
use crate::traits::oracle::Oracle;
use crate::types::responses::{
    ExtractionResult, PageRelevance, RepairCheck, RepairResult, RepairSearch, ReviewLinks,
    ReviewVerification, SearchQuery,
};

pub struct OllamaOracle {
    client: OllamaClient,
    model: String,
    reasoning_model: String,
    temperature: f32,
    num_ctx: u32,
}

impl OllamaOracle {
    /// Build an oracle from resolved settings.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self> {
        let client = OllamaClient::new(settings.base_url.clone()).with_timeout(settings.timeout())?;
        Ok(Self {
            client,
            model: settings.model.clone(),
            reasoning_model: settings.reasoning_model.clone(),
            temperature: settings.temperature,
            num_ctx: settings.num_ctx,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn reasoning_model(&self) -> &str {
        &self.reasoning_model
    }

    async fn ask<T: StructuredOutput>(&self, model: &str, prompt: String) -> Result<T> {
        debug!(model = %model, prompt_chars = prompt.len(), answer = %T::type_name(), "Oracle call");
        let request = StructuredRequest::new(model, prompt)
            .system(prompts::SYSTEM_PROMPT)
            .temperature(self.temperature)
            .num_ctx(self.num_ctx);
        Ok(self.client.extract::<T>(request).await?)
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn optimize_query(&self, topic: &str) -> Result<SearchQuery> {
        let prompt = prompts::format_generate_query_prompt(topic, &SearchQuery::schema_text());
        self.ask(&self.model, prompt).await
    }

    async fn check_relevance(&self, query: &str, url: &str, page_text: &str) -> Result<PageRelevance> {
        let prompt = prompts::format_filter_page_prompt(
            query,
            url,
            truncate_chars(page_text, MAX_FILTER_SNIPPET),
            &PageRelevance::schema_text(),
        );
        self.ask(&self.reasoning_model, prompt).await
    }

    async fn extract_reviews(&self, query: &str, url: &str, page_text: &str) -> Result<ExtractionResult> {
        let prompt = prompts::format_extract_prompt(
            query,
            url,
            truncate_chars(page_text, MAX_EXTRACT_SNIPPET),
            &ExtractionResult::schema_text(),
        );
        self.ask(&self.model, prompt).await
    }

    async fn detect_review_links(&self, base_url: &str, page_text: &str) -> Result<ReviewLinks> {
        let prompt = prompts::format_detect_links_prompt(
            base_url,
            truncate_chars(page_text, MAX_DETECT_SNIPPET),
            &ReviewLinks::schema_text(),
        );
        self.ask(&self.model, prompt).await
    }

    async fn check_completeness(
        &self,
        query: &str,
        page_text: &str,
        review_text: &str,
    ) -> Result<RepairCheck> {
        let prompt = prompts::format_completeness_prompt(
            query,
            truncate_chars(page_text, MAX_SNIPPET_LEN),
            review_text,
            &RepairCheck::schema_text(),
        );
        self.ask(&self.reasoning_model, prompt).await
    }

    async fn propose_search_term(
        &self,
        review_text: &str,
        failed_terms: &[String],
    ) -> Result<RepairSearch> {
        let prompt =
            prompts::format_repair_search_prompt(review_text, failed_terms, &RepairSearch::schema_text());
        self.ask(&self.model, prompt).await
    }

    async fn reconstruct(
        &self,
        query: &str,
        html_segments: &[String],
        current_text: &str,
    ) -> Result<RepairResult> {
        let prompt = prompts::format_repair_prompt(
            query,
            html_segments,
            current_text,
            &RepairResult::schema_text(),
        );
        self.ask(&self.model, prompt).await
    }

    async fn verify_authenticity(&self, query: &str, review_text: &str) -> Result<ReviewVerification> {
        let prompt = prompts::format_verify_prompt(query, review_text, &ReviewVerification::schema_text());
        self.ask(&self.model, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_selects_models() {
        let settings = OracleSettings {
            model: "small".into(),
            reasoning_model: "thinker".into(),
            ..Default::default()
        };
        let oracle = OllamaOracle::from_settings(&settings).unwrap();
        assert_eq!(oracle.model(), "small");
        assert_eq!(oracle.reasoning_model(), "thinker");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_oracle_error() {
        let settings = OracleSettings {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
            ..Default::default()
        };
        let oracle = OllamaOracle::from_settings(&settings).unwrap();
        let result = oracle.verify_authenticity("pizza", "Loved it").await;
        assert!(matches!(result, Err(crate::error::CrawlerError::Oracle(_))));
    }
}
