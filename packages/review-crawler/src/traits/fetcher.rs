//! Page fetcher trait for network access.

use async_trait::async_trait;

use crate::error::FetchResult;

/// Fetches the raw body of a page.
///
/// Implementations apply their own timeout and request headers and do not
/// retry; a failed fetch means "skip this URL".
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL and return its body as text.
    async fn fetch(&self, url: &str) -> FetchResult<String>;

    /// Name of this fetcher (for logging).
    fn name(&self) -> &str {
        "fetcher"
    }
}
