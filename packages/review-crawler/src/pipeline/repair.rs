//! Repair stage: reconstruct truncated reviews from cached markup.
//!
//! For each candidate the oracle first decides whether the text is a
//! truncated snippet. Complete candidates pass unchanged. Incomplete ones
//! enter a bounded search-then-reconstruct loop over the raw markup of
//! their page; a candidate that never reaches a "complete" verdict within
//! the attempt budget is discarded.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::html::{self, ContextSearch};
use crate::limits::{MAX_REPAIR_ATTEMPTS, MIN_REPAIR_LENGTH};
use crate::pipeline::state::PipelineState;
use crate::traits::{fetcher::PageFetcher, oracle::Oracle, storage::CacheStorage};
use crate::types::review::ReviewCandidate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairDelta {
    /// Candidates passed on to verification, in original order.
    pub batch: Vec<ReviewCandidate>,
    pub repaired: usize,
    pub discarded: usize,
}

/// One search-then-reconstruct attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairAttempt {
    /// 1-based attempt number
    pub index: usize,
    /// `None` if the oracle failed to propose a term
    pub search_term: Option<String>,
    /// Context blocks found for the term
    pub contexts: usize,
    /// Reconstruction verdict, `None` if no reconstruction was made
    pub complete: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    /// Text judged complete, candidate unchanged
    AlreadyComplete(ReviewCandidate),
    /// Reconstruction converged
    Repaired(ReviewCandidate),
    /// Attempt budget exhausted
    Discarded,
}

/// Outcome of one candidate together with its attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairReport {
    pub outcome: RepairOutcome,
    pub attempts: Vec<RepairAttempt>,
}

/// Repair every candidate of the batch.
pub async fn run<O, S, F>(
    state: &PipelineState,
    batch: Vec<ReviewCandidate>,
    oracle: &O,
    cache: &mut ContentCache<S, F>,
) -> RepairDelta
where
    O: Oracle + ?Sized,
    S: CacheStorage,
    F: PageFetcher,
{
    let mut delta = RepairDelta::default();
    // Raw markup and page text per origin URL
    let mut pages: HashMap<String, Option<(String, String)>> = HashMap::new();

    for candidate in batch {
        if !pages.contains_key(&candidate.origin_url) {
            let page = cache
                .raw(&candidate.origin_url)
                .await
                .map(|markup| {
                    let text = html::page_text(&markup);
                    (markup, text)
                });
            pages.insert(candidate.origin_url.clone(), page);
        }

        let Some(Some((markup, page_text))) = pages.get(&candidate.origin_url) else {
            debug!(url = %candidate.origin_url, "No cached markup, passing candidate through");
            delta.batch.push(candidate);
            continue;
        };

        let report = repair_candidate(oracle, &state.query, markup, page_text, candidate).await;
        match report.outcome {
            RepairOutcome::AlreadyComplete(candidate) => delta.batch.push(candidate),
            RepairOutcome::Repaired(candidate) => {
                delta.repaired += 1;
                delta.batch.push(candidate);
            }
            RepairOutcome::Discarded => delta.discarded += 1,
        }
    }

    info!(
        repaired = delta.repaired,
        discarded = delta.discarded,
        kept = delta.batch.len(),
        "Repair finished"
    );
    delta
}

/// Check one candidate and, if truncated, try to reconstruct it.
pub async fn repair_candidate<O: Oracle + ?Sized>(
    oracle: &O,
    query: &str,
    markup: &str,
    page_text: &str,
    mut candidate: ReviewCandidate,
) -> RepairReport {
    let incomplete = match oracle
        .check_completeness(query, page_text, &candidate.review_text)
        .await
    {
        Ok(check) => check.is_incomplete,
        Err(e) => {
            let complete = looks_complete(&candidate.review_text);
            warn!(error = %e, heuristic_complete = complete, "Completeness check failed");
            !complete
        }
    };

    if !incomplete {
        return RepairReport {
            outcome: RepairOutcome::AlreadyComplete(candidate),
            attempts: Vec::new(),
        };
    }

    info!(review = %candidate.preview(), "Repairing truncated review");

    let search = ContextSearch::default();
    let mut failed_terms: Vec<String> = Vec::new();
    let mut attempts = Vec::with_capacity(MAX_REPAIR_ATTEMPTS);

    for index in 1..=MAX_REPAIR_ATTEMPTS {
        let mut attempt = RepairAttempt {
            index,
            search_term: None,
            contexts: 0,
            complete: None,
        };

        let term = match oracle
            .propose_search_term(&candidate.review_text, &failed_terms)
            .await
        {
            Ok(answer) => answer.search_term.trim().to_string(),
            Err(e) => {
                warn!(attempt = index, error = %e, "Search term proposal failed");
                attempts.push(attempt);
                continue;
            }
        };
        attempt.search_term = Some(term.clone());

        let contexts = search.find(markup, &term);
        attempt.contexts = contexts.len();

        if contexts.is_empty() {
            debug!(attempt = index, term = %term, "Search term not found in markup");
            if !term.is_empty() {
                failed_terms.push(term);
            }
            attempts.push(attempt);
            continue;
        }

        match oracle
            .reconstruct(query, &contexts, &candidate.review_text)
            .await
        {
            Ok(result) => {
                candidate.review_text = result.fixed_text;
                attempt.complete = Some(result.is_complete);
                attempts.push(attempt);

                if result.is_complete {
                    info!(attempt = index, "Review repaired");
                    return RepairReport {
                        outcome: RepairOutcome::Repaired(candidate),
                        attempts,
                    };
                }
                debug!(attempt = index, "Text still incomplete");
            }
            Err(e) => {
                warn!(attempt = index, error = %e, "Reconstruction failed");
                attempts.push(attempt);
            }
        }
    }

    info!(
        attempts = attempts.len(),
        review = %candidate.preview(),
        "Discarding review that could not be repaired"
    );
    RepairReport {
        outcome: RepairOutcome::Discarded,
        attempts,
    }
}

/// Fallback verdict when the completeness check is unavailable.
pub fn looks_complete(text: &str) -> bool {
    !text.contains("...") && !text.contains('…') && text.chars().count() > MIN_REPAIR_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{review, MockOp, MockOracle, MockOracleCall};

    const MARKUP: &str = r#"<html><body>
        <div class="review"><p class="short">The tiramisu was divine and...</p>
        <p class="full" hidden>The tiramisu was divine and the espresso even better.</p></div>
        </body></html>"#;

    fn candidate(text: &str) -> ReviewCandidate {
        ReviewCandidate::from_extracted(review(text), "https://a.com/", "cache_a.html", false)
    }

    #[test]
    fn test_looks_complete() {
        assert!(!looks_complete("Short."));
        assert!(!looks_complete(&format!("{}...", "x".repeat(200))));
        assert!(!looks_complete(&format!("{}…", "x".repeat(200))));
        assert!(looks_complete(&"x".repeat(151)));
        assert!(!looks_complete(&"x".repeat(150)));
    }

    #[tokio::test]
    async fn test_complete_review_passes_unchanged() {
        let oracle = MockOracle::new();
        let report = repair_candidate(&oracle, "q", MARKUP, "", candidate("Lovely.")).await;

        assert_eq!(report.outcome, RepairOutcome::AlreadyComplete(candidate("Lovely.")));
        assert!(report.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_repairs_on_first_attempt() {
        let full = "The tiramisu was divine and the espresso even better.";
        let oracle = MockOracle::new()
            .with_incomplete("...")
            .with_repair("tiramisu", full, true);

        let report = repair_candidate(
            &oracle,
            "q",
            MARKUP,
            "",
            candidate("The tiramisu was divine and..."),
        )
        .await;

        match report.outcome {
            RepairOutcome::Repaired(c) => assert_eq!(c.review_text, full),
            other => panic!("expected repair, got {other:?}"),
        }
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].complete, Some(true));
    }

    #[tokio::test]
    async fn test_failed_terms_are_fed_back() {
        let oracle = MockOracle::new()
            .with_incomplete("...")
            .with_search_terms("tiramisu", ["not on the page", "tiramisu was divine"])
            .with_repair("tiramisu", "The tiramisu was divine and the espresso even better.", true);

        let report = repair_candidate(
            &oracle,
            "q",
            MARKUP,
            "",
            candidate("The tiramisu was divine and..."),
        )
        .await;

        assert!(matches!(report.outcome, RepairOutcome::Repaired(_)));
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].contexts, 0);

        let second_search = oracle
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockOracleCall::ProposeSearchTerm { failed_terms, .. } => Some(failed_terms),
                _ => None,
            })
            .nth(1)
            .unwrap();
        assert_eq!(second_search, ["not on the page"]);
    }

    #[tokio::test]
    async fn test_discards_after_attempt_budget() {
        // Default reconstruction never reports completeness
        let oracle = MockOracle::new().with_incomplete("...");

        let report = repair_candidate(
            &oracle,
            "q",
            MARKUP,
            "",
            candidate("The tiramisu was divine and..."),
        )
        .await;

        assert_eq!(report.outcome, RepairOutcome::Discarded);
        assert_eq!(report.attempts.len(), MAX_REPAIR_ATTEMPTS);
        assert_eq!(oracle.call_count(MockOp::Reconstruct), MAX_REPAIR_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_progress_carries_into_next_attempt() {
        let oracle = MockOracle::new()
            .with_incomplete("...")
            .with_repair("espresso even...", "The tiramisu was divine and the espresso even better.", true)
            .with_repair("divine and...", "The tiramisu was divine and the espresso even...", false);

        let report = repair_candidate(
            &oracle,
            "q",
            MARKUP,
            "",
            candidate("The tiramisu was divine and..."),
        )
        .await;

        assert!(matches!(report.outcome, RepairOutcome::Repaired(_)));
        assert_eq!(report.attempts.len(), 2);
        let reconstruct_inputs: Vec<String> = oracle
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockOracleCall::Reconstruct { current_text, .. } => Some(current_text),
                _ => None,
            })
            .collect();
        assert_eq!(
            reconstruct_inputs,
            [
                "The tiramisu was divine and...",
                "The tiramisu was divine and the espresso even..."
            ]
        );
    }

    #[tokio::test]
    async fn test_completeness_failure_uses_heuristic() {
        let oracle = MockOracle::new().with_failure(MockOp::CheckCompleteness);
        let long = "x ".repeat(100);

        let report = repair_candidate(&oracle, "q", MARKUP, "", candidate(&long)).await;
        assert!(matches!(report.outcome, RepairOutcome::AlreadyComplete(_)));

        let report = repair_candidate(&oracle, "q", MARKUP, "", candidate("Too short")).await;
        assert!(!matches!(report.outcome, RepairOutcome::AlreadyComplete(_)));
    }

    #[tokio::test]
    async fn test_reconstruct_failure_consumes_attempts() {
        let oracle = MockOracle::new()
            .with_incomplete("...")
            .with_failure(MockOp::Reconstruct);

        let report = repair_candidate(
            &oracle,
            "q",
            MARKUP,
            "",
            candidate("The tiramisu was divine and..."),
        )
        .await;

        assert_eq!(report.outcome, RepairOutcome::Discarded);
        assert_eq!(report.attempts.len(), MAX_REPAIR_ATTEMPTS);
        assert!(report.attempts.iter().all(|a| a.complete.is_none()));
    }

    #[tokio::test]
    async fn test_stage_passes_through_without_markup() {
        use crate::cache::{ContentCache, MemoryCacheStorage};
        use crate::config::RunConfig;
        use crate::testing::MockFetcher;

        let oracle = MockOracle::new().with_incomplete("...");
        let fetcher = MockFetcher::new();
        let mut cache = ContentCache::new(MemoryCacheStorage::new(), fetcher.clone());
        let state = PipelineState::new(RunConfig::new("q"));

        let batch = vec![candidate("The tiramisu was divine and...")];
        let delta = run(&state, batch.clone(), &oracle, &mut cache).await;

        assert_eq!(delta.batch, batch);
        assert_eq!(fetcher.total_requests(), 0);
        assert!(oracle.calls().is_empty());
    }
}
