//! Pipeline state, stages and transitions.
//!
//! Stages never mutate [`PipelineState`] directly. Each one reads the
//! current state and returns a delta; the runner merges deltas and then
//! asks [`Stage::next`] where to go.

use std::collections::HashSet;

use crate::config::RunConfig;
use crate::frontier::{ForbiddenList, Frontier};
use crate::types::audit::{RelevanceRecord, RunStats, StepMetric};
use crate::types::review::ReviewCandidate;

/// Everything a run accumulates.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Search query; starts as the topic and may be rewritten once.
    pub query: String,

    /// Maximum number of accepted reviews.
    pub quota: usize,

    /// Accepted reviews, append-only.
    pub reviews: Vec<ReviewCandidate>,

    /// Candidates of the current iteration.
    pub batch: Vec<ReviewCandidate>,

    pub frontier: Frontier,

    /// URLs that came from seeds or search results (not discovered links).
    pub seed_urls: HashSet<String>,

    pub relevance_log: Vec<RelevanceRecord>,
    pub metrics: Vec<StepMetric>,
    pub stats: RunStats,
    pub config: RunConfig,
}

impl PipelineState {
    /// Initial state. Configured seed URLs are queued immediately.
    pub fn new(config: RunConfig) -> Self {
        let mut state = Self {
            query: config.query.clone(),
            quota: config.max_reviews,
            reviews: Vec::new(),
            batch: Vec::new(),
            frontier: Frontier::new(ForbiddenList::new(&config.forbidden_urls)),
            seed_urls: HashSet::new(),
            relevance_log: Vec::new(),
            metrics: Vec::new(),
            stats: RunStats::default(),
            config,
        };

        let seeds = state.config.seed_urls.clone();
        state.add_seeds(&seeds);
        state
    }

    /// Queue URLs as seeds. Returns how many were new.
    pub fn add_seeds(&mut self, urls: &[String]) -> usize {
        let mut added = 0;
        for url in urls {
            if let Some(normalized) = self.frontier.enqueue_if_new(url) {
                self.seed_urls.insert(normalized);
                added += 1;
            }
        }
        added
    }

    /// Whether `url` was reached by following a discovered link.
    pub fn is_discovered(&self, url: &str) -> bool {
        let key = Frontier::normalize(url).unwrap_or_else(|| url.to_string());
        !self.seed_urls.contains(&key)
    }

    pub fn quota_reached(&self) -> bool {
        self.reviews.len() >= self.quota
    }

    /// Free slots left under the quota.
    pub fn remaining_slots(&self) -> usize {
        self.quota.saturating_sub(self.reviews.len())
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GenerateQuery,
    Retrieve,
    Extract,
    Repair,
    Verify,
    Terminate,
}

impl Stage {
    /// Entry stage for a configuration.
    pub fn initial(config: &RunConfig) -> Self {
        if config.has_seeds() {
            Stage::Extract
        } else if config.skip_query_generation {
            Stage::Retrieve
        } else {
            Stage::GenerateQuery
        }
    }

    /// Transition after the stage's delta has been merged into `state`.
    pub fn next(self, state: &PipelineState) -> Self {
        match self {
            Stage::GenerateQuery if state.config.has_seeds() => Stage::Extract,
            Stage::GenerateQuery => Stage::Retrieve,
            Stage::Retrieve => Stage::Extract,
            Stage::Extract if state.batch.is_empty() => Stage::Verify,
            Stage::Extract => Stage::Repair,
            Stage::Repair => Stage::Verify,
            Stage::Verify if state.quota_reached() || state.frontier.is_empty() => Stage::Terminate,
            Stage::Verify => Stage::Extract,
            Stage::Terminate => Stage::Terminate,
        }
    }

    /// Name used for logging and metrics.
    pub fn name(self) -> &'static str {
        use crate::telemetry::stage_names::*;
        match self {
            Stage::GenerateQuery => GENERATE_QUERY,
            Stage::Retrieve => RETRIEVAL,
            Stage::Extract => EXTRACT,
            Stage::Repair => REPAIR,
            Stage::Verify => VERIFY,
            Stage::Terminate => "Terminate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::responses::ExtractedReview;

    fn candidate(text: &str) -> ReviewCandidate {
        ReviewCandidate::from_extracted(
            ExtractedReview {
                review_title: None,
                review_text: text.into(),
                stars: None,
            },
            "https://a.com/",
            "cache_a.html",
            false,
        )
    }

    #[test]
    fn test_initial_stage() {
        assert_eq!(Stage::initial(&RunConfig::new("q")), Stage::GenerateQuery);
        assert_eq!(
            Stage::initial(&RunConfig::new("q").skip_query_generation()),
            Stage::Retrieve
        );
        assert_eq!(
            Stage::initial(&RunConfig::new("q").with_seed_urls(["https://a.com/"])),
            Stage::Extract
        );
    }

    #[test]
    fn test_extract_branches_on_batch() {
        let mut state = PipelineState::new(RunConfig::new("q"));
        assert_eq!(Stage::Extract.next(&state), Stage::Verify);

        state.batch.push(candidate("great"));
        assert_eq!(Stage::Extract.next(&state), Stage::Repair);
        assert_eq!(Stage::Repair.next(&state), Stage::Verify);
    }

    #[test]
    fn test_verify_loops_until_quota_or_empty_frontier() {
        let config = RunConfig::new("q")
            .with_max_reviews(1)
            .with_seed_urls(["https://a.com/", "https://b.com/"]);
        let mut state = PipelineState::new(config);
        assert_eq!(Stage::Verify.next(&state), Stage::Extract);

        state.reviews.push(candidate("great"));
        assert_eq!(Stage::Verify.next(&state), Stage::Terminate);

        state.reviews.clear();
        state.frontier.clear_queue();
        assert_eq!(Stage::Verify.next(&state), Stage::Terminate);
        assert_eq!(Stage::Terminate.next(&state), Stage::Terminate);
    }

    #[test]
    fn test_seeds_are_not_discoveries() {
        let config = RunConfig::new("q")
            .with_seed_urls(["https://a.com/reviews", "https://a.com/reviews#dup"])
            .with_forbidden_urls(["blocked.com"])
            .with_seed_urls(["https://blocked.com/"]);
        let state = PipelineState::new(config);

        assert_eq!(state.frontier.len(), 1);
        assert!(!state.is_discovered("https://a.com/reviews"));
        assert!(state.is_discovered("https://a.com/reviews?page=2"));
        assert_eq!(state.remaining_slots(), 50);
    }
}
