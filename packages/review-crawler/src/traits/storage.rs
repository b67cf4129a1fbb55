//! Durable storage behind the content cache.
//!
//! The layout is a set of page bodies addressed by cache identifier plus
//! one index mapping URL to identifier. Only [`ContentCache`] talks to a
//! `CacheStorage`, so all index writes funnel through one owner.
//!
//! [`ContentCache`]: crate::cache::ContentCache

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::Result;

/// URL → cache identifier mapping, in insertion order.
pub type CacheIndex = IndexMap<String, String>;

/// Durable storage for cached page bodies and the cache index.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Read a stored body. `Ok(None)` if nothing is stored under `cache_id`.
    async fn read_body(&self, cache_id: &str) -> Result<Option<String>>;

    /// Store a body verbatim under `cache_id`.
    async fn write_body(&self, cache_id: &str, body: &str) -> Result<()>;

    /// Load the persisted index (empty if none exists yet).
    async fn load_index(&self) -> Result<CacheIndex>;

    /// Replace the persisted index wholesale.
    ///
    /// Implementations must never leave a partially written index behind.
    async fn save_index(&self, index: &CacheIndex) -> Result<()>;
}
