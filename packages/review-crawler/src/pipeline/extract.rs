//! Extract stage: one page in, candidates and discovered links out.
//!
//! Oracle calls run in order relevance → extraction → link discovery, so an
//! irrelevant page costs a single call.

use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::frontier::Frontier;
use crate::html;
use crate::pipeline::state::PipelineState;
use crate::traits::{fetcher::PageFetcher, oracle::Oracle, storage::CacheStorage};
use crate::types::audit::RelevanceRecord;
use crate::types::review::ReviewCandidate;

/// What happened to the popped URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Frontier was empty
    NoUrl,
    /// Quota already met; the URL was dropped unprocessed
    QuotaReached,
    AlreadyVisited,
    Forbidden,
    FetchFailed,
    Irrelevant,
    Processed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractDelta {
    pub outcome: PageOutcome,

    /// URL to add to the visited set.
    pub visited: Option<String>,

    pub candidates: Vec<ReviewCandidate>,

    /// Absolute links found on the page, not yet deduplicated.
    pub discovered_links: Vec<String>,

    pub relevance: Option<RelevanceRecord>,
}

impl ExtractDelta {
    fn empty(outcome: PageOutcome, visited: Option<String>) -> Self {
        Self {
            outcome,
            visited,
            candidates: Vec::new(),
            discovered_links: Vec::new(),
            relevance: None,
        }
    }
}

/// Process the URL popped from the frontier.
pub async fn run<O, S, F>(
    state: &PipelineState,
    url: Option<String>,
    oracle: &O,
    cache: &mut ContentCache<S, F>,
) -> ExtractDelta
where
    O: Oracle + ?Sized,
    S: CacheStorage,
    F: PageFetcher,
{
    let Some(url) = url else {
        debug!("Frontier is empty");
        return ExtractDelta::empty(PageOutcome::NoUrl, None);
    };

    if state.quota_reached() {
        info!(
            accepted = state.reviews.len(),
            quota = state.quota,
            url = %url,
            "Quota already reached, not processing"
        );
        return ExtractDelta::empty(PageOutcome::QuotaReached, None);
    }

    if state.frontier.is_visited(&url) {
        debug!(url = %url, "Skipping already visited URL");
        return ExtractDelta::empty(PageOutcome::AlreadyVisited, None);
    }

    if state.frontier.is_forbidden(&url) {
        info!(url = %url, "Skipping forbidden URL");
        return ExtractDelta::empty(PageOutcome::Forbidden, Some(url));
    }

    let discovered = state.is_discovered(&url);
    info!(url = %url, discovered, "Processing URL");

    let Some(page) = cache.fetch(&url).await else {
        return ExtractDelta::empty(PageOutcome::FetchFailed, Some(url));
    };

    let page_text = html::page_text(&page.body);
    let query = state.query.as_str();

    let relevance = match oracle.check_relevance(query, &url, &page_text).await {
        Ok(verdict) => RelevanceRecord::new(&url, &page.cache_id, verdict.is_relevant),
        Err(e) => {
            warn!(url = %url, error = %e, "Relevance check failed, treating page as relevant");
            RelevanceRecord::failed_open(&url, &page.cache_id, e.to_string())
        }
    };

    if !relevance.is_relevant {
        info!(url = %url, "Page not relevant");
        return ExtractDelta {
            relevance: Some(relevance),
            ..ExtractDelta::empty(PageOutcome::Irrelevant, Some(url))
        };
    }

    let candidates: Vec<ReviewCandidate> = match oracle.extract_reviews(query, &url, &page_text).await {
        Ok(result) => result
            .reviews
            .into_iter()
            .filter(|r| !r.review_text.trim().is_empty())
            .map(|r| ReviewCandidate::from_extracted(r, &url, &page.cache_id, discovered))
            .collect(),
        Err(e) => {
            warn!(url = %url, error = %e, "Review extraction failed");
            Vec::new()
        }
    };
    info!(url = %url, count = candidates.len(), "Extracted reviews");

    let discovered_links = if state.config.disable_discovery {
        debug!("Link discovery disabled");
        Vec::new()
    } else {
        match oracle.detect_review_links(&url, &page_text).await {
            Ok(links) => links
                .urls
                .iter()
                .filter_map(|link| Frontier::resolve(&url, link))
                .collect(),
            Err(e) => {
                warn!(url = %url, error = %e, "Link discovery failed");
                Vec::new()
            }
        }
    };

    ExtractDelta {
        outcome: PageOutcome::Processed,
        visited: Some(url),
        candidates,
        discovered_links,
        relevance: Some(relevance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::config::RunConfig;
    use crate::testing::{review, MockFetcher, MockOp, MockOracle};

    const URL: &str = "https://pizza.example/reviews";
    const PAGE: &str = "<html><body><p>Great crust.</p><a href='?page=2'>next</a></body></html>";

    fn seeded_state() -> PipelineState {
        PipelineState::new(RunConfig::new("pizza").with_seed_urls([URL]))
    }

    fn cache(fetcher: &MockFetcher) -> ContentCache<MemoryCacheStorage, MockFetcher> {
        ContentCache::new(MemoryCacheStorage::new(), fetcher.clone())
    }

    #[tokio::test]
    async fn test_processes_relevant_page() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new()
            .with_reviews(URL, vec![review("Great crust."), review("  ")])
            .with_links(URL, ["?page=2", "mailto:owner@pizza.example"]);
        let mut state = seeded_state();
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert_eq!(delta.outcome, PageOutcome::Processed);
        assert_eq!(delta.visited.as_deref(), Some(URL));
        assert_eq!(delta.candidates.len(), 1);
        assert!(!delta.candidates[0].discovered);
        assert_eq!(delta.candidates[0].cache_id, crate::cache::cache_id(URL));
        assert_eq!(delta.discovered_links, ["https://pizza.example/reviews?page=2"]);
        assert!(delta.relevance.unwrap().is_relevant);
    }

    #[tokio::test]
    async fn test_irrelevant_page_stops_after_one_call() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new().with_relevance(URL, false);
        let mut state = seeded_state();
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert_eq!(delta.outcome, PageOutcome::Irrelevant);
        assert!(delta.candidates.is_empty());
        assert!(delta.discovered_links.is_empty());
        assert!(!delta.relevance.unwrap().is_relevant);
        assert_eq!(oracle.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_relevance_failure_fails_open() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new()
            .with_failure(MockOp::CheckRelevance)
            .with_reviews(URL, vec![review("Great crust.")]);
        let mut state = seeded_state();
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        let record = delta.relevance.unwrap();
        assert!(record.is_relevant);
        assert!(record.check_error.is_some());
        assert_eq!(delta.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_still_discovers_links() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new()
            .with_failure(MockOp::ExtractReviews)
            .with_links(URL, ["/more"]);
        let mut state = seeded_state();
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert!(delta.candidates.is_empty());
        assert_eq!(delta.discovered_links, ["https://pizza.example/more"]);
    }

    #[tokio::test]
    async fn test_discovery_disabled() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new().with_links(URL, ["/more"]);
        let mut state = PipelineState::new(
            RunConfig::new("pizza").with_seed_urls([URL]).disable_discovery(),
        );
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert!(delta.discovered_links.is_empty());
        assert_eq!(oracle.call_count(MockOp::DetectLinks), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_visited_without_record() {
        let fetcher = MockFetcher::new().with_failure(URL);
        let oracle = MockOracle::new();
        let mut state = seeded_state();
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert_eq!(delta.outcome, PageOutcome::FetchFailed);
        assert_eq!(delta.visited.as_deref(), Some(URL));
        assert!(delta.relevance.is_none());
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_is_visited_without_fetch() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new();
        let state = PipelineState::new(RunConfig::new("pizza").with_forbidden_urls(["pizza.example"]));

        let delta = run(&state, Some(URL.to_string()), &oracle, &mut cache(&fetcher)).await;

        assert_eq!(delta.outcome, PageOutcome::Forbidden);
        assert_eq!(delta.visited.as_deref(), Some(URL));
        assert_eq!(fetcher.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_quota_short_circuit() {
        let fetcher = MockFetcher::new().with_page(URL, PAGE);
        let oracle = MockOracle::new();
        let mut state = PipelineState::new(
            RunConfig::new("pizza").with_seed_urls([URL]).with_max_reviews(0),
        );
        let url = state.frontier.pop();

        let delta = run(&state, url, &oracle, &mut cache(&fetcher)).await;

        assert_eq!(delta.outcome, PageOutcome::QuotaReached);
        assert!(delta.visited.is_none());
        assert_eq!(fetcher.total_requests(), 0);
        assert!(oracle.calls().is_empty());
    }
}
