//! Testing utilities including mock implementations.
//!
//! These let the whole pipeline run without an inference server, network
//! access or a GPU host. Every mock is cheap to clone; clones share state,
//! so a test can keep one handle for assertions and give another to the
//! pipeline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CrawlerError, FetchError, FetchResult, Result};
use crate::telemetry::{PowerProbe, PowerProbeFactory};
use crate::traits::{
    fetcher::PageFetcher,
    oracle::Oracle,
    searcher::{SearchResult, WebSearcher},
};
use crate::types::responses::{
    ExtractedReview, ExtractionResult, PageRelevance, RepairCheck, RepairResult, RepairSearch,
    ReviewLinks, ReviewVerification, SearchQuery,
};

/// Oracle operations, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    OptimizeQuery,
    CheckRelevance,
    ExtractReviews,
    DetectLinks,
    CheckCompleteness,
    ProposeSearchTerm,
    Reconstruct,
    VerifyAuthenticity,
}

/// Record of a call made to the mock oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOracleCall {
    OptimizeQuery { topic: String },
    CheckRelevance { url: String },
    ExtractReviews { url: String },
    DetectLinks { url: String },
    CheckCompleteness { review_text: String },
    ProposeSearchTerm { review_text: String, failed_terms: Vec<String> },
    Reconstruct { current_text: String, segments: usize },
    VerifyAuthenticity { review_text: String },
}

impl MockOracleCall {
    pub fn op(&self) -> MockOp {
        match self {
            Self::OptimizeQuery { .. } => MockOp::OptimizeQuery,
            Self::CheckRelevance { .. } => MockOp::CheckRelevance,
            Self::ExtractReviews { .. } => MockOp::ExtractReviews,
            Self::DetectLinks { .. } => MockOp::DetectLinks,
            Self::CheckCompleteness { .. } => MockOp::CheckCompleteness,
            Self::ProposeSearchTerm { .. } => MockOp::ProposeSearchTerm,
            Self::Reconstruct { .. } => MockOp::Reconstruct,
            Self::VerifyAuthenticity { .. } => MockOp::VerifyAuthenticity,
        }
    }
}

/// A mock oracle for testing.
///
/// Answers are scripted per operation. Unscripted calls get permissive
/// defaults: pages are relevant, pages hold no reviews and no links,
/// reviews are complete and authentic, the search term is the first words
/// of the review, and reconstruction returns the text unchanged and
/// incomplete.
#[derive(Clone, Default)]
pub struct MockOracle {
    /// Optimized query answer
    optimized_query: Arc<RwLock<Option<String>>>,

    /// Relevance verdicts by URL
    relevance: Arc<RwLock<HashMap<String, bool>>>,

    /// Extracted reviews by URL
    extractions: Arc<RwLock<HashMap<String, Vec<ExtractedReview>>>>,

    /// Detected links by URL
    links: Arc<RwLock<HashMap<String, Vec<String>>>>,

    /// Review text fragments judged incomplete
    incomplete: Arc<RwLock<Vec<String>>>,

    /// Search terms to hand out, by review text fragment
    search_terms: Arc<RwLock<Vec<(String, VecDeque<String>)>>>,

    /// Reconstructions by current text fragment
    repairs: Arc<RwLock<Vec<(String, RepairResult)>>>,

    /// Review text fragments judged inauthentic
    rejected: Arc<RwLock<Vec<String>>>,

    /// Operations that fail
    failures: Arc<RwLock<HashSet<MockOp>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockOracleCall>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer query optimization with `query`.
    pub fn with_optimized_query(self, query: impl Into<String>) -> Self {
        *self.optimized_query.write().unwrap() = Some(query.into());
        self
    }

    /// Judge the page at `url` relevant or not.
    pub fn with_relevance(self, url: impl Into<String>, relevant: bool) -> Self {
        self.relevance.write().unwrap().insert(url.into(), relevant);
        self
    }

    /// Reviews extracted from the page at `url`.
    pub fn with_reviews(self, url: impl Into<String>, reviews: Vec<ExtractedReview>) -> Self {
        self.extractions.write().unwrap().insert(url.into(), reviews);
        self
    }

    /// Links detected on the page at `url`.
    pub fn with_links(
        self,
        url: impl Into<String>,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.links
            .write()
            .unwrap()
            .insert(url.into(), links.into_iter().map(Into::into).collect());
        self
    }

    /// Judge reviews containing `fragment` incomplete.
    pub fn with_incomplete(self, fragment: impl Into<String>) -> Self {
        self.incomplete.write().unwrap().push(fragment.into());
        self
    }

    /// Hand out `terms` in order for reviews containing `fragment`.
    pub fn with_search_terms(
        self,
        fragment: impl Into<String>,
        terms: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.search_terms
            .write()
            .unwrap()
            .push((fragment.into(), terms.into_iter().map(Into::into).collect()));
        self
    }

    /// Reconstruct texts containing `fragment` to `fixed_text`.
    pub fn with_repair(
        self,
        fragment: impl Into<String>,
        fixed_text: impl Into<String>,
        is_complete: bool,
    ) -> Self {
        self.repairs.write().unwrap().push((
            fragment.into(),
            RepairResult {
                fixed_text: fixed_text.into(),
                is_complete,
            },
        ));
        self
    }

    /// Judge reviews containing `fragment` inauthentic.
    pub fn with_rejected(self, fragment: impl Into<String>) -> Self {
        self.rejected.write().unwrap().push(fragment.into());
        self
    }

    /// Make every call of `op` fail.
    pub fn with_failure(self, op: MockOp) -> Self {
        self.failures.write().unwrap().insert(op);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockOracleCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls of one operation.
    pub fn call_count(&self, op: MockOp) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    fn record(&self, call: MockOracleCall) -> Result<()> {
        let op = call.op();
        self.calls.write().unwrap().push(call);
        if self.failures.read().unwrap().contains(&op) {
            return Err(CrawlerError::oracle(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("mock failure: {op:?}"),
            )));
        }
        Ok(())
    }
}

fn default_search_term(review_text: &str) -> String {
    review_text
        .split_whitespace()
        .filter(|w| !w.contains("...") && !w.contains('…'))
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Oracle for MockOracle {
    async fn optimize_query(&self, topic: &str) -> Result<SearchQuery> {
        self.record(MockOracleCall::OptimizeQuery {
            topic: topic.to_string(),
        })?;
        let optimized_query = self
            .optimized_query
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| topic.to_string());
        Ok(SearchQuery { optimized_query })
    }

    async fn check_relevance(&self, _query: &str, url: &str, _page_text: &str) -> Result<PageRelevance> {
        self.record(MockOracleCall::CheckRelevance {
            url: url.to_string(),
        })?;
        let is_relevant = self.relevance.read().unwrap().get(url).copied().unwrap_or(true);
        Ok(PageRelevance { is_relevant })
    }

    async fn extract_reviews(&self, _query: &str, url: &str, _page_text: &str) -> Result<ExtractionResult> {
        self.record(MockOracleCall::ExtractReviews {
            url: url.to_string(),
        })?;
        let reviews = self
            .extractions
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default();
        Ok(ExtractionResult { reviews })
    }

    async fn detect_review_links(&self, base_url: &str, _page_text: &str) -> Result<ReviewLinks> {
        self.record(MockOracleCall::DetectLinks {
            url: base_url.to_string(),
        })?;
        let urls = self
            .links
            .read()
            .unwrap()
            .get(base_url)
            .cloned()
            .unwrap_or_default();
        Ok(ReviewLinks { urls })
    }

    async fn check_completeness(
        &self,
        _query: &str,
        _page_text: &str,
        review_text: &str,
    ) -> Result<RepairCheck> {
        self.record(MockOracleCall::CheckCompleteness {
            review_text: review_text.to_string(),
        })?;
        let is_incomplete = self
            .incomplete
            .read()
            .unwrap()
            .iter()
            .any(|f| review_text.contains(f.as_str()));
        Ok(RepairCheck { is_incomplete })
    }

    async fn propose_search_term(
        &self,
        review_text: &str,
        failed_terms: &[String],
    ) -> Result<RepairSearch> {
        self.record(MockOracleCall::ProposeSearchTerm {
            review_text: review_text.to_string(),
            failed_terms: failed_terms.to_vec(),
        })?;

        let scripted = self
            .search_terms
            .write()
            .unwrap()
            .iter_mut()
            .find(|(fragment, _)| review_text.contains(fragment.as_str()))
            .and_then(|(_, terms)| terms.pop_front());

        Ok(RepairSearch {
            search_term: scripted.unwrap_or_else(|| default_search_term(review_text)),
        })
    }

    async fn reconstruct(
        &self,
        _query: &str,
        html_segments: &[String],
        current_text: &str,
    ) -> Result<RepairResult> {
        self.record(MockOracleCall::Reconstruct {
            current_text: current_text.to_string(),
            segments: html_segments.len(),
        })?;

        let scripted = self
            .repairs
            .read()
            .unwrap()
            .iter()
            .find(|(fragment, _)| current_text.contains(fragment.as_str()))
            .map(|(_, result)| result.clone());

        Ok(scripted.unwrap_or_else(|| RepairResult {
            fixed_text: current_text.to_string(),
            is_complete: false,
        }))
    }

    async fn verify_authenticity(&self, _query: &str, review_text: &str) -> Result<ReviewVerification> {
        self.record(MockOracleCall::VerifyAuthenticity {
            review_text: review_text.to_string(),
        })?;
        let is_authentic = !self
            .rejected
            .read()
            .unwrap()
            .iter()
            .any(|f| review_text.contains(f.as_str()));
        Ok(ReviewVerification { is_authentic })
    }
}

/// A mock page fetcher serving canned bodies.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), body.into());
        self
    }

    /// Make requests for `url` time out.
    pub fn with_failure(self, url: impl Into<String>) -> Self {
        self.failures.write().unwrap().insert(url.into());
        self
    }

    /// Number of requests made for `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.read().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    /// URLs requested, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.requests.write().unwrap().push(url.to_string());

        if self.failures.read().unwrap().contains(url) {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock web searcher with canned results per query.
#[derive(Clone, Default)]
pub struct MockWebSearcher {
    results: Arc<RwLock<HashMap<String, Vec<SearchResult>>>>,
    transient_failures: Arc<AtomicUsize>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockWebSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for `query`, in rank order.
    pub fn with_results<'a>(self, query: impl Into<String>, urls: impl IntoIterator<Item = &'a str>) -> Self {
        let results = urls.into_iter().filter_map(SearchResult::from_url).collect();
        self.results.write().unwrap().insert(query.into(), results);
        self
    }

    /// Fail the next `count` searches.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Queries searched, in order (including failed attempts).
    pub fn queries(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl WebSearcher for MockWebSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.write().unwrap().push(query.to_string());

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CrawlerError::search(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "mock transient failure",
            )));
        }

        Ok(self
            .results
            .read()
            .unwrap()
            .get(query)
            .map(|r| r.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }
}

/// A power probe replaying fixed readings.
pub struct StaticPowerProbe {
    readings: VecDeque<f64>,
    delay: Duration,
}

impl StaticPowerProbe {
    pub fn new(readings: Vec<f64>, delay: Duration) -> Self {
        Self {
            readings: readings.into(),
            delay,
        }
    }

    /// Factory opening a fresh replay of `readings` per stage.
    ///
    /// Each reading is delivered after `delay`.
    pub fn factory(readings: Vec<f64>, delay: Duration) -> StaticProbeFactory {
        StaticProbeFactory { readings, delay }
    }
}

impl PowerProbe for StaticPowerProbe {
    fn sample(&mut self) -> Option<f64> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.readings.pop_front()
    }
}

#[derive(Debug, Clone)]
pub struct StaticProbeFactory {
    readings: Vec<f64>,
    delay: Duration,
}

impl PowerProbeFactory for StaticProbeFactory {
    fn connect(&self) -> Option<Box<dyn PowerProbe>> {
        Some(Box::new(StaticPowerProbe::new(self.readings.clone(), self.delay)))
    }
}

/// Shorthand for an extracted review without title or rating.
pub fn review(text: impl Into<String>) -> ExtractedReview {
    ExtractedReview {
        review_title: None,
        review_text: text.into(),
        stars: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_oracle_records_calls_and_failures() {
        let oracle = MockOracle::new()
            .with_relevance("https://a.com", false)
            .with_failure(MockOp::VerifyAuthenticity);

        let verdict = oracle.check_relevance("q", "https://a.com", "").await.unwrap();
        assert!(!verdict.is_relevant);
        assert!(oracle.verify_authenticity("q", "text").await.is_err());

        assert_eq!(oracle.calls().len(), 2);
        assert_eq!(oracle.call_count(MockOp::VerifyAuthenticity), 1);
    }

    #[tokio::test]
    async fn test_scripted_search_terms_then_default() {
        let oracle = MockOracle::new().with_search_terms("tiramisu", ["first", "second"]);

        let text = "The tiramisu was divine and...";
        assert_eq!(oracle.propose_search_term(text, &[]).await.unwrap().search_term, "first");
        assert_eq!(oracle.propose_search_term(text, &[]).await.unwrap().search_term, "second");
        assert_eq!(
            oracle.propose_search_term(text, &[]).await.unwrap().search_term,
            "The tiramisu was divine"
        );
    }

    #[tokio::test]
    async fn test_mock_searcher_transient_failures() {
        let searcher = MockWebSearcher::new()
            .with_results("pizza", ["https://a.com/", "https://b.com/"])
            .with_transient_failures(1);

        assert!(searcher.search("pizza", 5).await.is_err());
        assert_eq!(searcher.search("pizza", 1).await.unwrap().len(), 1);
        assert_eq!(searcher.call_count(), 2);
    }
}
