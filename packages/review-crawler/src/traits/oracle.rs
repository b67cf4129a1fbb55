//! Oracle trait for structured LLM judgements.
//!
//! The pipeline never depends on how inference is performed. Each method is
//! one prompt-in / typed-answer-out call; the callers own the fallback
//! policy applied when a call fails.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::responses::{
    ExtractionResult, PageRelevance, RepairCheck, RepairResult, RepairSearch, ReviewLinks,
    ReviewVerification, SearchQuery,
};

/// Reasoning oracle used by every pipeline stage.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Rewrite a research topic into a keyword search query.
    async fn optimize_query(&self, topic: &str) -> Result<SearchQuery>;

    /// Decide whether a page holds review content about `query`.
    async fn check_relevance(&self, query: &str, url: &str, page_text: &str)
        -> Result<PageRelevance>;

    /// Extract individual reviews from page text.
    async fn extract_reviews(&self, query: &str, url: &str, page_text: &str)
        -> Result<ExtractionResult>;

    /// Find links that likely lead to more reviews (pagination, "read more").
    async fn detect_review_links(&self, base_url: &str, page_text: &str) -> Result<ReviewLinks>;

    /// Decide whether a review text is a truncated snippet.
    async fn check_completeness(
        &self,
        query: &str,
        page_text: &str,
        review_text: &str,
    ) -> Result<RepairCheck>;

    /// Pick a substring of `review_text` to locate it in the page markup.
    ///
    /// `failed_terms` lists earlier terms that were not found.
    async fn propose_search_term(
        &self,
        review_text: &str,
        failed_terms: &[String],
    ) -> Result<RepairSearch>;

    /// Reconstruct the full review from markup segments around it.
    async fn reconstruct(
        &self,
        query: &str,
        html_segments: &[String],
        current_text: &str,
    ) -> Result<RepairResult>;

    /// Decide whether a text is an authentic, individually authored review.
    async fn verify_authenticity(&self, query: &str, review_text: &str)
        -> Result<ReviewVerification>;
}
