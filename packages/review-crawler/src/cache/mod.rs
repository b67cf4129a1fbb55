//! URL-keyed content cache.
//!
//! Every page body is fetched from the network at most once across runs.
//! Lookups go memory → durable storage → network. A fetched body is stored
//! verbatim together with an index entry mapping its URL to its cache
//! identifier, and the same body is returned for the rest of the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use review_crawler::cache::{ContentCache, FsCacheStorage};
//! use review_crawler::fetchers::HttpFetcher;
//!
//! let mut cache = ContentCache::new(FsCacheStorage::new("_html_cache"), HttpFetcher::new()?);
//! if let Some(page) = cache.fetch("https://example.com/reviews").await {
//!     println!("{} bytes stored as {}", page.body.len(), page.cache_id);
//! }
//! ```

pub mod fs;
pub mod memory;

pub use fs::FsCacheStorage;
pub use memory::MemoryCacheStorage;

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::fetcher::PageFetcher;
use crate::traits::storage::{CacheIndex, CacheStorage};

/// Cache identifier for a URL: `cache_<md5 hex of the URL>.html`.
pub fn cache_id(url: &str) -> String {
    format!("cache_{:x}.html", md5::compute(url.as_bytes()))
}

/// A page body together with the identifier it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedContent {
    pub url: String,
    pub cache_id: String,
    pub body: String,
}

/// Read-through cache in front of a [`PageFetcher`].
pub struct ContentCache<S, F> {
    storage: S,
    fetcher: F,
    memory: HashMap<String, CachedContent>,
    index: Option<CacheIndex>,
}

impl<S: CacheStorage, F: PageFetcher> ContentCache<S, F> {
    pub fn new(storage: S, fetcher: F) -> Self {
        Self {
            storage,
            fetcher,
            memory: HashMap::new(),
            index: None,
        }
    }

    /// Body of `url`, fetching it at most once.
    ///
    /// Returns `None` when the page is neither cached nor fetchable. A
    /// failed fetch is never cached, so a later run tries again.
    pub async fn fetch(&mut self, url: &str) -> Option<CachedContent> {
        if let Some(hit) = self.memory.get(url) {
            debug!(url = %url, "Memory cache hit");
            return Some(hit.clone());
        }

        if let Some(stored) = self.load_stored(url).await {
            debug!(url = %url, cache_id = %stored.cache_id, "Disk cache hit");
            self.memory.insert(url.to_string(), stored.clone());
            return Some(stored);
        }

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, fetcher = self.fetcher.name(), error = %e, "Fetch failed");
                return None;
            }
        };

        let content = CachedContent {
            url: url.to_string(),
            cache_id: cache_id(url),
            body,
        };

        // A storage failure only costs durability; the body is still usable.
        if let Err(e) = self.persist(&content).await {
            warn!(url = %url, error = %e, "Failed to persist cached page");
        }

        info!(url = %url, cache_id = %content.cache_id, bytes = content.body.len(), "Fetched and cached page");
        self.memory.insert(url.to_string(), content.clone());
        Some(content)
    }

    /// Stored markup of `url` without touching the network.
    pub async fn raw(&mut self, url: &str) -> Option<String> {
        if let Some(hit) = self.memory.get(url) {
            return Some(hit.body.clone());
        }

        let stored = self.load_stored(url).await?;
        let body = stored.body.clone();
        self.memory.insert(url.to_string(), stored);
        Some(body)
    }

    /// Number of URLs in the index.
    pub async fn indexed_count(&mut self) -> usize {
        self.index().await.len()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn index(&mut self) -> &mut CacheIndex {
        if self.index.is_none() {
            let loaded = match self.storage.load_index().await {
                Ok(index) => index,
                Err(e) => {
                    warn!(error = %e, "Failed to load cache index, starting empty");
                    CacheIndex::new()
                }
            };
            self.index = Some(loaded);
        }
        self.index.get_or_insert_with(CacheIndex::new)
    }

    async fn load_stored(&mut self, url: &str) -> Option<CachedContent> {
        let indexed = self.index().await.get(url).cloned();
        let id = indexed.clone().unwrap_or_else(|| cache_id(url));

        let body = match self.storage.read_body(&id).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                if indexed.is_some() {
                    debug!(url = %url, cache_id = %id, "Index entry without stored body");
                }
                return None;
            }
            Err(e) => {
                warn!(url = %url, cache_id = %id, error = %e, "Failed to read cached body");
                return None;
            }
        };

        if indexed.is_none() {
            // Body on disk but index entry lost: restore the entry.
            self.index().await.insert(url.to_string(), id.clone());
            if let Err(e) = self.save_index().await {
                warn!(url = %url, error = %e, "Failed to repair cache index");
            }
        }

        Some(CachedContent {
            url: url.to_string(),
            cache_id: id,
            body,
        })
    }

    async fn persist(&mut self, content: &CachedContent) -> Result<()> {
        self.storage.write_body(&content.cache_id, &content.body).await?;
        self.index()
            .await
            .insert(content.url.clone(), content.cache_id.clone());
        self.save_index().await
    }

    async fn save_index(&mut self) -> Result<()> {
        let index = self.index().await.clone();
        self.storage.save_index(&index).await
    }
}
