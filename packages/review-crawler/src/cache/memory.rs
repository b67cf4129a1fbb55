//! In-memory cache storage for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::storage::{CacheIndex, CacheStorage};

/// Cache storage kept in process memory.
///
/// Clones share the same data, so a test can hand one clone to a cache and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    bodies: Arc<RwLock<HashMap<String, String>>>,
    index: Arc<RwLock<CacheIndex>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the persisted index.
    pub fn index_snapshot(&self) -> CacheIndex {
        self.index.read().unwrap().clone()
    }

    /// Number of stored bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.read().unwrap().len()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn read_body(&self, cache_id: &str) -> Result<Option<String>> {
        Ok(self.bodies.read().unwrap().get(cache_id).cloned())
    }

    async fn write_body(&self, cache_id: &str, body: &str) -> Result<()> {
        self.bodies
            .write()
            .unwrap()
            .insert(cache_id.to_string(), body.to_string());
        Ok(())
    }

    async fn load_index(&self) -> Result<CacheIndex> {
        Ok(self.index.read().unwrap().clone())
    }

    async fn save_index(&self, index: &CacheIndex) -> Result<()> {
        *self.index.write().unwrap() = index.clone();
        Ok(())
    }
}
