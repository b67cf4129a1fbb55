//! Retrieve stage: web search seeds the frontier.

use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::frontier::ForbiddenList;
use crate::limits::DENYLISTED_DOMAIN;
use crate::pipeline::state::PipelineState;
use crate::traits::searcher::{SearchResult, WebSearcher};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveDelta {
    /// Result URLs in rank order, after filtering.
    pub urls: Vec<String>,
}

pub async fn run<W: WebSearcher + ?Sized>(state: &PipelineState, searcher: &W) -> RetrieveDelta {
    let config = &state.config;
    let results = search_with_retry(
        searcher,
        &state.query,
        config.search_results,
        &config.search_retry,
    )
    .await;

    info!(query = %state.query, count = results.len(), "Search results");

    let forbidden = ForbiddenList::new(&config.forbidden_urls);
    let urls: Vec<String> = results
        .into_iter()
        .map(|r| r.url.to_string())
        .filter(|url| {
            let keep = !url.to_lowercase().contains(DENYLISTED_DOMAIN) && !forbidden.matches(url);
            if !keep {
                debug!(url = %url, "Dropping filtered search result");
            }
            keep
        })
        .collect();

    info!(remaining = urls.len(), "Search results after filter");
    RetrieveDelta { urls }
}

/// Search with exponential backoff. Exhausted retries yield no results.
pub async fn search_with_retry<W: WebSearcher + ?Sized>(
    searcher: &W,
    query: &str,
    max_results: usize,
    policy: &RetryPolicy,
) -> Vec<SearchResult> {
    for attempt in 0..policy.attempts {
        match searcher.search(query, max_results).await {
            Ok(results) => return results,
            Err(e) => {
                let last = attempt + 1 >= policy.attempts;
                warn!(
                    query = %query,
                    attempt = attempt + 1,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Search failed"
                );
                if !last {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    warn!(query = %query, "Search retries exhausted, continuing without results");
    Vec::new()
}
