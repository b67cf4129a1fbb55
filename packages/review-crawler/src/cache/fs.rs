//! Directory-backed cache storage.
//!
//! Layout: one file per page body named by its cache identifier, plus
//! `cache_index.json` mapping URL to identifier. Writes go to a temporary
//! file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::traits::storage::{CacheIndex, CacheStorage};

pub const INDEX_FILE: &str = "cache_index.json";

#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    dir: PathBuf,
}

impl FsCacheStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    async fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn read_body(&self, cache_id: &str) -> Result<Option<String>> {
        match tokio::fs::read(self.dir.join(cache_id)).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_body(&self, cache_id: &str, body: &str) -> Result<()> {
        self.write_atomic(cache_id, body.as_bytes()).await
    }

    async fn load_index(&self) -> Result<CacheIndex> {
        let raw = match tokio::fs::read_to_string(self.index_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheIndex::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(path = %self.index_path().display(), error = %e, "Corrupt cache index, starting empty");
                Ok(CacheIndex::new())
            }
        }
    }

    async fn save_index(&self, index: &CacheIndex) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        self.write_atomic(INDEX_FILE, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_body_roundtrip_and_missing() {
        let dir = TempDir::new().unwrap();
        let storage = FsCacheStorage::new(dir.path().join("cache"));

        assert_eq!(storage.read_body("cache_x.html").await.unwrap(), None);

        storage.write_body("cache_x.html", "<html>ü</html>").await.unwrap();
        assert_eq!(
            storage.read_body("cache_x.html").await.unwrap().as_deref(),
            Some("<html>ü</html>")
        );
        assert!(dir.path().join("cache/cache_x.html").exists());
        assert!(!dir.path().join("cache/.cache_x.html.tmp").exists());
    }

    #[tokio::test]
    async fn test_index_persists_in_order() {
        let dir = TempDir::new().unwrap();
        let storage = FsCacheStorage::new(dir.path());

        assert!(storage.load_index().await.unwrap().is_empty());

        let mut index = CacheIndex::new();
        index.insert("https://b.com".into(), "cache_b.html".into());
        index.insert("https://a.com".into(), "cache_a.html".into());
        storage.save_index(&index).await.unwrap();

        let loaded = storage.load_index().await.unwrap();
        let urls: Vec<&String> = loaded.keys().collect();
        assert_eq!(urls, ["https://b.com", "https://a.com"]);
    }

    #[tokio::test]
    async fn test_corrupt_index_loads_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();

        let storage = FsCacheStorage::new(dir.path());
        assert!(storage.load_index().await.unwrap().is_empty());
    }
}
