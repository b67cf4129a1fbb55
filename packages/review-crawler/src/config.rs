//! Run configuration.
//!
//! A `RunConfig` is resolved once before the pipeline starts and never
//! changes during the run. Defaults can be overlaid from the environment
//! (and a `.env` file) with [`RunConfig::from_env`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CrawlerError, Result};

/// Default quota of accepted reviews per run.
pub const DEFAULT_MAX_REVIEWS: usize = 50;

/// Default number of search results requested by retrieval.
pub const DEFAULT_SEARCH_RESULTS: usize = 5;

/// Configuration for one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Topic the reviews are about (e.g. "Apple Store Berlin reviews").
    pub query: String,

    /// Quota: maximum number of accepted reviews.
    pub max_reviews: usize,

    /// Number of results requested from web search.
    pub search_results: usize,

    /// URL substrings that are never fetched or enqueued (case-insensitive).
    #[serde(default)]
    pub forbidden_urls: Vec<String>,

    /// Start URLs. When present, query generation and retrieval are skipped.
    #[serde(default)]
    pub seed_urls: Vec<String>,

    /// Use the topic verbatim as the search query.
    pub skip_query_generation: bool,

    /// Do not ask the oracle for further review links.
    pub disable_discovery: bool,

    /// Oracle backend selection.
    pub oracle: OracleSettings,

    /// Search retry policy.
    pub search_retry: RetryPolicy,

    /// Power telemetry side channel.
    pub telemetry: TelemetrySettings,

    /// Directory holding cached page bodies and the cache index.
    pub cache_dir: PathBuf,

    /// Directory receiving `results_<session>/` folders.
    pub results_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_reviews: DEFAULT_MAX_REVIEWS,
            search_results: DEFAULT_SEARCH_RESULTS,
            forbidden_urls: vec![],
            seed_urls: vec![],
            skip_query_generation: false,
            disable_discovery: false,
            oracle: OracleSettings::default(),
            search_retry: RetryPolicy::default(),
            telemetry: TelemetrySettings::default(),
            cache_dir: PathBuf::from("_html_cache"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl RunConfig {
    /// Create a config for a topic with default values.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Create a config for a topic, overlaying environment variables.
    ///
    /// Reads `LLM_URL`, `LLM_MODEL`, `LLM_REASONING_MODEL`, `LLM_TEMPERATURE`,
    /// `RETRIEVER_MAX_RESULTS`, `SSH_HOST` and `SSH_USER`.
    pub fn from_env(query: impl Into<String>) -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let mut config = Self::new(query);

        if let Some(url) = env_var("LLM_URL") {
            config.oracle.base_url = url;
        }
        if let Some(model) = env_var("LLM_MODEL") {
            config.oracle.model = model;
        }
        if let Some(model) = env_var("LLM_REASONING_MODEL") {
            config.oracle.reasoning_model = model;
        }
        if let Some(temperature) = env_var("LLM_TEMPERATURE") {
            config.oracle.temperature = temperature.parse().map_err(|_| {
                CrawlerError::Config(format!("LLM_TEMPERATURE must be a number, got {temperature:?}"))
            })?;
        }
        if let Some(results) = env_var("RETRIEVER_MAX_RESULTS") {
            config.search_results = results.parse().map_err(|_| {
                CrawlerError::Config(format!(
                    "RETRIEVER_MAX_RESULTS must be a positive integer, got {results:?}"
                ))
            })?;
        }
        config.telemetry.ssh_host = env_var("SSH_HOST");
        config.telemetry.ssh_user = env_var("SSH_USER");

        Ok(config)
    }

    /// Set the quota.
    pub fn with_max_reviews(mut self, max: usize) -> Self {
        self.max_reviews = max;
        self
    }

    /// Set the number of search results.
    pub fn with_search_results(mut self, count: usize) -> Self {
        self.search_results = count;
        self
    }

    /// Add forbidden URL substrings.
    pub fn with_forbidden_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.forbidden_urls.extend(urls.into_iter().map(|u| u.into()));
        self
    }

    /// Add seed URLs.
    pub fn with_seed_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.seed_urls.extend(urls.into_iter().map(|u| u.into()));
        self
    }

    /// Use the topic verbatim as search query.
    pub fn skip_query_generation(mut self) -> Self {
        self.skip_query_generation = true;
        self
    }

    /// Disable link discovery.
    pub fn disable_discovery(mut self) -> Self {
        self.disable_discovery = true;
        self
    }

    /// Set the oracle settings.
    pub fn with_oracle(mut self, oracle: OracleSettings) -> Self {
        self.oracle = oracle;
        self
    }

    /// Set the search retry policy.
    pub fn with_search_retry(mut self, retry: RetryPolicy) -> Self {
        self.search_retry = retry;
        self
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the results directory.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Whether seed URLs were supplied.
    pub fn has_seeds(&self) -> bool {
        !self.seed_urls.is_empty()
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() && !self.has_seeds() {
            return Err(CrawlerError::Config(
                "a query is required when no seed URLs are given".into(),
            ));
        }

        for seed in &self.seed_urls {
            let parsed = Url::parse(seed)
                .map_err(|_| CrawlerError::Config(format!("seed URL is not absolute: {seed}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CrawlerError::Config(format!(
                    "seed URL must use http or https: {seed}"
                )));
            }
        }

        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(CrawlerError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.oracle.temperature
            )));
        }

        if !self.has_seeds() && self.search_results == 0 {
            return Err(CrawlerError::Config(
                "search_results must be > 0 when retrieval runs".into(),
            ));
        }

        if self.search_retry.attempts == 0 {
            return Err(CrawlerError::Config("search retry attempts must be > 0".into()));
        }

        Ok(())
    }
}

/// Which oracle backend to use, resolved once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Ollama server URL.
    pub base_url: String,

    /// Model for extraction, link discovery, repair and verification.
    pub model: String,

    /// Model for relevance and completeness judgements.
    pub reasoning_model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Context window in tokens.
    pub num_ctx: u32,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: ollama_client::DEFAULT_BASE_URL.to_string(),
            model: "gemma3:27b".to_string(),
            reasoning_model: "gpt-oss:20b".to_string(),
            temperature: 0.0,
            num_ctx: ollama_client::DEFAULT_NUM_CTX,
            timeout_secs: 300,
        }
    }
}

impl OracleSettings {
    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry with exponential backoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,

    /// Delay before the first retry; doubled for each further retry.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy without waits between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay_ms: 0,
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Where power readings come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Host running the GPU. Sampling is disabled when unset.
    pub ssh_host: Option<String>,

    /// Login user on that host.
    pub ssh_user: Option<String>,
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
