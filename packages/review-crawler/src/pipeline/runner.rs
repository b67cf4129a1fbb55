//! Pipeline runner: drives stages until termination.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::ContentCache;
use crate::config::RunConfig;
use crate::error::Result;
use crate::pipeline::extract::{self, ExtractDelta, PageOutcome};
use crate::pipeline::repair::{self, RepairDelta};
use crate::pipeline::state::{PipelineState, Stage};
use crate::pipeline::verify::{self, VerifyDelta};
use crate::pipeline::{query, retrieve};
use crate::telemetry::{NoopProbeFactory, PowerProbeFactory, StageTracker};
use crate::traits::{
    fetcher::PageFetcher, oracle::Oracle, searcher::WebSearcher, storage::CacheStorage,
};
use crate::types::audit::{RelevanceRecord, RunStats, StepMetric};
use crate::types::review::ReviewCandidate;

/// Everything a finished run exposes.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final search query (after optimization)
    pub query: String,
    pub reviews: Vec<ReviewCandidate>,
    pub relevance_log: Vec<RelevanceRecord>,
    pub metrics: Vec<StepMetric>,
    pub stats: RunStats,
    /// Visited URLs in visit order
    pub visited: Vec<String>,
}

/// Runs one crawl with injected collaborators.
///
/// # Example
///
/// ```rust,ignore
/// let cache = ContentCache::new(FsCacheStorage::new(&config.cache_dir), HttpFetcher::new()?);
/// let oracle = OllamaOracle::from_settings(&config.oracle)?;
/// let mut pipeline = Pipeline::new(config, oracle, DuckDuckGoSearcher::new(), cache);
/// let outcome = pipeline.run().await?;
/// ```
pub struct Pipeline<O, W, S, F> {
    config: RunConfig,
    oracle: O,
    searcher: W,
    cache: ContentCache<S, F>,
    probes: Arc<dyn PowerProbeFactory>,
}

impl<O, W, S, F> Pipeline<O, W, S, F>
where
    O: Oracle,
    W: WebSearcher,
    S: CacheStorage,
    F: PageFetcher,
{
    pub fn new(config: RunConfig, oracle: O, searcher: W, cache: ContentCache<S, F>) -> Self {
        Self {
            config,
            oracle,
            searcher,
            cache,
            probes: Arc::new(NoopProbeFactory),
        }
    }

    /// Sample power through `probes` during every stage.
    pub fn with_probe_factory(mut self, probes: Arc<dyn PowerProbeFactory>) -> Self {
        self.probes = probes;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cache(&self) -> &ContentCache<S, F> {
        &self.cache
    }

    /// Run to termination.
    ///
    /// Only an invalid configuration is an error; every per-page and
    /// per-candidate failure degrades inside its stage.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.config.validate()?;

        let mut state = PipelineState::new(self.config.clone());
        let mut stage = Stage::initial(&self.config);

        info!(
            query = %state.query,
            quota = state.quota,
            seeds = state.seed_urls.len(),
            "Starting crawl"
        );

        while stage != Stage::Terminate {
            let tracker = StageTracker::start(stage.name(), self.probes.as_ref());

            match stage {
                Stage::GenerateQuery => {
                    let delta = query::run(&state, &self.oracle).await;
                    state.query = delta.query;
                }
                Stage::Retrieve => {
                    let delta = retrieve::run(&state, &self.searcher).await;
                    let added = state.add_seeds(&delta.urls);
                    info!(added, frontier = state.frontier.len(), "Frontier seeded from search");
                }
                Stage::Extract => {
                    let url = state.frontier.pop();
                    let delta = extract::run(&state, url, &self.oracle, &mut self.cache).await;
                    merge_extract(&mut state, delta);
                }
                Stage::Repair => {
                    let batch = std::mem::take(&mut state.batch);
                    let delta = repair::run(&state, batch, &self.oracle, &mut self.cache).await;
                    merge_repair(&mut state, delta);
                }
                Stage::Verify => {
                    let batch = std::mem::take(&mut state.batch);
                    let delta = verify::run(&state, batch, &self.oracle).await;
                    merge_verify(&mut state, delta);
                }
                Stage::Terminate => {}
            }

            state.metrics.push(tracker.finish().await);
            stage = stage.next(&state);
            debug!(next = stage.name(), "Stage transition");
        }

        if state.quota_reached() {
            info!(accepted = state.reviews.len(), quota = state.quota, "Quota reached, stopping");
        } else {
            info!(accepted = state.reviews.len(), quota = state.quota, "Frontier empty, stopping");
        }

        Ok(RunOutcome {
            visited: state.frontier.visited().map(str::to_string).collect(),
            query: state.query,
            reviews: state.reviews,
            relevance_log: state.relevance_log,
            metrics: state.metrics,
            stats: state.stats,
        })
    }
}

fn merge_extract(state: &mut PipelineState, delta: ExtractDelta) {
    match delta.outcome {
        PageOutcome::AlreadyVisited | PageOutcome::Forbidden | PageOutcome::FetchFailed => {
            state.stats.pages_skipped += 1;
        }
        PageOutcome::Irrelevant => {
            state.stats.pages_fetched += 1;
            state.stats.pages_irrelevant += 1;
        }
        PageOutcome::Processed => state.stats.pages_fetched += 1,
        PageOutcome::NoUrl | PageOutcome::QuotaReached => {}
    }

    if let Some(url) = delta.visited {
        state.frontier.mark_visited(&url);
    }

    if let Some(record) = delta.relevance {
        if record.check_error.is_some() {
            state.stats.relevance_check_failures += 1;
        }
        state.relevance_log.push(record);
    }

    state.stats.candidates_extracted += delta.candidates.len();
    state.batch = delta.candidates;

    let mut enqueued = 0;
    for link in &delta.discovered_links {
        if state.frontier.enqueue_if_new(link).is_some() {
            enqueued += 1;
        }
    }
    if !delta.discovered_links.is_empty() {
        debug!(
            found = delta.discovered_links.len(),
            enqueued,
            frontier = state.frontier.len(),
            "Discovered links"
        );
    }
}

fn merge_repair(state: &mut PipelineState, delta: RepairDelta) {
    state.stats.candidates_repaired += delta.repaired;
    state.stats.candidates_discarded += delta.discarded;
    state.batch = delta.batch;
}

fn merge_verify(state: &mut PipelineState, delta: VerifyDelta) {
    state.stats.candidates_rejected += delta.rejected;
    state.stats.verification_failures += delta.verification_failures;
    state.stats.candidates_capped += delta.capped;
    if delta.capped > 0 {
        state.stats.cap_events += 1;
    }
    state.reviews.extend(delta.accepted);
    state.batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::config::RetryPolicy;
    use crate::testing::{review, MockFetcher, MockOp, MockOracle, MockWebSearcher};

    type TestPipeline = Pipeline<MockOracle, MockWebSearcher, MemoryCacheStorage, MockFetcher>;

    fn pipeline(config: RunConfig, oracle: &MockOracle, searcher: &MockWebSearcher, fetcher: &MockFetcher) -> TestPipeline {
        Pipeline::new(
            config.with_search_retry(RetryPolicy::immediate(3)),
            oracle.clone(),
            searcher.clone(),
            ContentCache::new(MemoryCacheStorage::new(), fetcher.clone()),
        )
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_run() {
        let oracle = MockOracle::new();
        let searcher = MockWebSearcher::new();
        let fetcher = MockFetcher::new();

        let result = pipeline(RunConfig::new(""), &oracle, &searcher, &fetcher).run().await;
        assert!(matches!(result, Err(crate::error::CrawlerError::Config(_))));
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_run_from_search() {
        let oracle = MockOracle::new()
            .with_optimized_query("pizza naples reviews")
            .with_reviews("https://a.example/", vec![review("Best pizza ever.")])
            .with_links("https://a.example/", ["/page/2"])
            .with_reviews("https://a.example/page/2", vec![review("Crust was fine.")]);
        let searcher = MockWebSearcher::new().with_results("pizza naples reviews", ["https://a.example/"]);
        let fetcher = MockFetcher::new()
            .with_page("https://a.example/", "<p>Best pizza ever.</p>")
            .with_page("https://a.example/page/2", "<p>Crust was fine.</p>");

        let outcome = pipeline(RunConfig::new("pizza in Naples"), &oracle, &searcher, &fetcher)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.query, "pizza naples reviews");
        assert_eq!(outcome.reviews.len(), 2);
        assert!(!outcome.reviews[0].discovered);
        assert!(outcome.reviews[1].discovered);
        assert_eq!(outcome.visited, ["https://a.example/", "https://a.example/page/2"]);
        assert_eq!(outcome.relevance_log.len(), 2);
        assert_eq!(outcome.stats.pages_fetched, 2);
        assert_eq!(outcome.stats.candidates_extracted, 2);

        let steps: Vec<&str> = outcome.metrics.iter().map(|m| m.step.as_str()).collect();
        assert_eq!(
            steps,
            [
                "Generate Query",
                "Retrieval",
                "Extract and Detect",
                "Repair",
                "Verify Reviews",
                "Extract and Detect",
                "Repair",
                "Verify Reviews"
            ]
        );
    }

    #[tokio::test]
    async fn test_skip_query_generation_uses_topic() {
        let oracle = MockOracle::new();
        let searcher = MockWebSearcher::new();
        let fetcher = MockFetcher::new();

        let outcome = pipeline(
            RunConfig::new("pizza in Naples").skip_query_generation(),
            &oracle,
            &searcher,
            &fetcher,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(searcher.queries(), ["pizza in Naples"]);
        assert_eq!(oracle.call_count(MockOp::OptimizeQuery), 0);
        assert_eq!(outcome.metrics[0].step, "Retrieval");
    }

    #[tokio::test]
    async fn test_seed_urls_skip_query_and_search() {
        let oracle = MockOracle::new().with_reviews("https://a.example/", vec![review("Lovely.")]);
        let searcher = MockWebSearcher::new();
        let fetcher = MockFetcher::new().with_page("https://a.example/", "<p>Lovely.</p>");

        let outcome = pipeline(
            RunConfig::new("pizza").with_seed_urls(["https://a.example/"]),
            &oracle,
            &searcher,
            &fetcher,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(searcher.call_count(), 0);
        assert_eq!(oracle.call_count(MockOp::OptimizeQuery), 0);
        assert_eq!(outcome.reviews.len(), 1);
        assert_eq!(outcome.metrics[0].step, "Extract and Detect");
    }

    #[tokio::test]
    async fn test_verification_failures_are_counted() {
        let oracle = MockOracle::new()
            .with_failure(MockOp::VerifyAuthenticity)
            .with_reviews("https://a.example/", vec![review("Lovely."), review("Cold pasta.")]);
        let searcher = MockWebSearcher::new();
        let fetcher = MockFetcher::new().with_page("https://a.example/", "<p>Lovely.</p>");

        let outcome = pipeline(
            RunConfig::new("pizza").with_seed_urls(["https://a.example/"]),
            &oracle,
            &searcher,
            &fetcher,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome.reviews.len(), 2);
        assert_eq!(outcome.stats.verification_failures, 2);
        assert_eq!(outcome.stats.candidates_rejected, 0);
    }
}
