//! Typed errors for the review crawler.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Inside a running
//! pipeline none of these escape a stage: each stage logs the error and
//! falls back to its skip/default/discard policy. Only configuration
//! errors and the final report write reach the caller.

use thiserror::Error;

/// Errors surfaced by the crawler's collaborators.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Malformed or missing run configuration (fatal, raised before the run)
    #[error("config error: {0}")]
    Config(String),

    /// Oracle call failed or returned an unusable answer
    #[error("oracle error: {0}")]
    Oracle(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Web search failed
    #[error("search error: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Page fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Durable storage read or write failed
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlerError {
    /// Wrap an oracle backend error.
    pub fn oracle(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Oracle(Box::new(err))
    }

    /// Wrap a search backend error.
    pub fn search(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Search(Box::new(err))
    }
}

impl From<ollama_client::OllamaError> for CrawlerError {
    fn from(err: ollama_client::OllamaError) -> Self {
        Self::oracle(err)
    }
}

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the fetch timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
