//! Review crawler
//!
//! Crawls the web for user-generated reviews about a topic, extracts them
//! with a language-model oracle, reconstructs reviews that pages truncated,
//! verifies authenticity and stops at a quota.
//!
//! # Usage
//!
//! ```rust,ignore
//! use review_crawler::{ContentCache, MemoryCacheStorage, Pipeline, RunConfig};
//! use review_crawler::testing::{MockFetcher, MockOracle, MockWebSearcher};
//!
//! let config = RunConfig::new("Apple Store Berlin reviews").with_max_reviews(10);
//! let cache = ContentCache::new(MemoryCacheStorage::new(), MockFetcher::new());
//! let mut pipeline = Pipeline::new(config, MockOracle::new(), MockWebSearcher::new(), cache);
//! let outcome = pipeline.run().await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams to the oracle, web search, page fetching and cache storage
//! - [`pipeline`] - The stage state machine and its runner
//! - [`frontier`] - Breadth-first URL queue with visited set
//! - [`cache`] - URL-keyed content cache
//! - [`html`] - Visible text and markup context search
//! - [`oracle`] - Ollama-backed oracle and prompts
//! - [`telemetry`] - Stage timing and GPU power sampling
//! - [`output`] - Result artifact
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod config;
pub mod error;
pub mod fetchers;
pub mod frontier;
pub mod html;
pub mod limits;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod search;
pub mod telemetry;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use cache::{cache_id, CachedContent, ContentCache, FsCacheStorage, MemoryCacheStorage};
pub use config::{OracleSettings, RetryPolicy, RunConfig, TelemetrySettings};
pub use error::{CrawlerError, FetchError, FetchResult, Result};
pub use fetchers::HttpFetcher;
pub use frontier::{ForbiddenList, Frontier};
pub use oracle::OllamaOracle;
pub use output::{RunReport, RunSummary};
pub use pipeline::{Pipeline, PipelineState, RunOutcome, Stage};
pub use search::DuckDuckGoSearcher;
pub use telemetry::{PowerProbe, PowerProbeFactory, SshPowerProbeFactory, StageTracker};
pub use traits::{
    fetcher::PageFetcher,
    oracle::Oracle,
    searcher::{SearchResult, WebSearcher},
    storage::{CacheIndex, CacheStorage},
};
pub use types::{
    audit::{RelevanceRecord, RunStats, StepMetric},
    review::ReviewCandidate,
};
