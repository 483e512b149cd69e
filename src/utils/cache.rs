//! Local caching for search results and AI responses.
//!
//! This module provides a file-based cache for per-source search results and
//! for AI outputs (embeddings, summaries, categorizations), replacing repeat
//! network calls against both the bibliographic APIs and the AI endpoint.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.cache/pharma-research/
//!   searches/
//!     <hash>.json
//!   ai/
//!     <hash>.json
//! ```
//!
//! Each cached item is a JSON file containing the cached data plus metadata.

use crate::config::{default_cache_dir, CacheConfig};
use crate::models::{SearchQuery, SearchResponse};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Cache metadata stored with each cached item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the item was cached (Unix timestamp)
    cached_at: u64,

    /// When the item expires (Unix timestamp)
    expires_at: u64,

    /// What produced this entry (source id, or AI kind)
    producer: String,
}

/// Wrapper pairing metadata with a cached payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedItem<T> {
    metadata: CacheMetadata,
    payload: T,
}

/// Result of a cache lookup
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Kind of AI output stored in the cache (selects the TTL)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiCacheKind {
    Embedding,
    Summary,
    Categories,
}

impl AiCacheKind {
    fn prefix(&self) -> &'static str {
        match self {
            AiCacheKind::Embedding => "embedding",
            AiCacheKind::Summary => "summary",
            AiCacheKind::Categories => "categories",
        }
    }
}

/// Cache service for storing and retrieving cached data
#[derive(Debug, Clone)]
pub struct CacheService {
    /// Base cache directory
    base_dir: PathBuf,

    /// Search cache directory
    search_dir: PathBuf,

    /// AI output cache directory
    ai_dir: PathBuf,

    /// Configuration
    config: CacheConfig,
}

impl CacheService {
    /// Create a new cache service with the given config
    pub fn from_config(config: CacheConfig) -> Self {
        let base_dir = config.directory.clone().unwrap_or_else(default_cache_dir);

        let search_dir = base_dir.join("searches");
        let ai_dir = base_dir.join("ai");

        Self {
            base_dir,
            search_dir,
            ai_dir,
            config,
        }
    }

    /// Initialize the cache directories
    pub fn initialize(&self) -> std::io::Result<()> {
        if self.config.enabled {
            fs::create_dir_all(&self.search_dir)?;
            fs::create_dir_all(&self.ai_dir)?;
            tracing::info!("Cache initialized at: {}", self.base_dir.display());
        } else {
            tracing::debug!("Cache is disabled");
        }
        Ok(())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Generate a cache key for a search query
    fn search_cache_key(&self, query: &SearchQuery, source: &str) -> String {
        let input = format!(
            "{}|{}|{}|{}|{}",
            query.query,
            source,
            query.max_results,
            query.year.as_deref().unwrap_or_default(),
            query.author.as_deref().unwrap_or_default()
        );

        let digest = md5::compute(input.as_bytes());
        format!("{:x}", digest)
    }

    /// Generate a cache key for an AI output
    fn ai_cache_key(&self, kind: AiCacheKind, text: &str) -> String {
        let digest = md5::compute(text.as_bytes());
        format!("{}-{:x}", kind.prefix(), digest)
    }

    /// Check if a cache entry is expired
    fn is_expired(&self, expires_at: u64) -> bool {
        now_unix() >= expires_at
    }

    /// Read a cached search response
    pub fn get_search(&self, query: &SearchQuery, source: &str) -> CacheResult<SearchResponse> {
        if !self.is_enabled() {
            return CacheResult::Miss;
        }

        let key = self.search_cache_key(query, source);
        let cache_path = self.search_dir.join(&key);

        match self.read_cache_file::<CachedItem<SearchResponse>>(&cache_path) {
            Ok(cached) => {
                if self.is_expired(cached.metadata.expires_at) {
                    tracing::debug!("Cache expired for search: {}", key);
                    CacheResult::Expired
                } else {
                    tracing::debug!("Cache HIT for search: {}", key);
                    CacheResult::Hit(cached.payload)
                }
            }
            Err(_) => {
                tracing::debug!("Cache MISS for search: {}", key);
                CacheResult::Miss
            }
        }
    }

    /// Cache a search response
    pub fn set_search(&self, source: &str, query: &SearchQuery, response: &SearchResponse) {
        if !self.is_enabled() {
            return;
        }

        let key = self.search_cache_key(query, source);
        let cache_path = self.search_dir.join(&key);

        let cached = CachedItem {
            metadata: CacheMetadata {
                cached_at: now_unix(),
                expires_at: now_unix() + self.config.search_ttl_seconds,
                producer: source.to_string(),
            },
            payload: response.clone(),
        };

        if let Err(e) = self.write_cache_file(&cache_path, &cached) {
            tracing::warn!("Failed to cache search result: {}", e);
        } else {
            tracing::debug!("Cached search result: {}", key);
        }
    }

    /// Read a cached AI output for the given input text
    pub fn get_ai<T: DeserializeOwned>(&self, kind: AiCacheKind, text: &str) -> CacheResult<T> {
        if !self.is_enabled() {
            return CacheResult::Miss;
        }

        let key = self.ai_cache_key(kind, text);
        let cache_path = self.ai_dir.join(&key);

        match self.read_cache_file::<CachedItem<T>>(&cache_path) {
            Ok(cached) => {
                if self.is_expired(cached.metadata.expires_at) {
                    tracing::debug!("Cache expired for AI output: {}", key);
                    CacheResult::Expired
                } else {
                    tracing::debug!("Cache HIT for AI output: {}", key);
                    CacheResult::Hit(cached.payload)
                }
            }
            Err(_) => {
                tracing::debug!("Cache MISS for AI output: {}", key);
                CacheResult::Miss
            }
        }
    }

    /// Cache an AI output keyed by its input text
    pub fn set_ai<T: Serialize>(&self, kind: AiCacheKind, text: &str, payload: &T) {
        if !self.is_enabled() {
            return;
        }

        let ttl = match kind {
            AiCacheKind::Embedding => self.config.embedding_ttl_seconds,
            AiCacheKind::Summary | AiCacheKind::Categories => self.config.enrich_ttl_seconds,
        };

        let key = self.ai_cache_key(kind, text);
        let cache_path = self.ai_dir.join(&key);

        let cached = CachedItem {
            metadata: CacheMetadata {
                cached_at: now_unix(),
                expires_at: now_unix() + ttl,
                producer: kind.prefix().to_string(),
            },
            payload,
        };

        if let Err(e) = self.write_cache_file(&cache_path, &cached) {
            tracing::warn!("Failed to cache AI output: {}", e);
        } else {
            tracing::debug!("Cached AI output: {}", key);
        }
    }

    /// Read a cached file and deserialize it
    fn read_cache_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T, std::io::Error> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Serialize and write a cached file
    fn write_cache_file<T: Serialize>(&self, path: &Path, data: &T) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content)
    }

    /// Clear all cached data
    pub fn clear_all(&self) -> std::io::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let _ = fs::remove_dir_all(&self.base_dir);
        self.initialize()?;
        tracing::info!("Cache cleared");
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if !self.is_enabled() {
            return CacheStats::disabled();
        }

        let search_count = self.search_dir.read_dir().map(|e| e.count()).unwrap_or(0);
        let ai_count = self.ai_dir.read_dir().map(|e| e.count()).unwrap_or(0);

        let search_size = self.dir_size(&self.search_dir).map(|s| s / 1024).unwrap_or(0); // KB
        let ai_size = self.dir_size(&self.ai_dir).map(|s| s / 1024).unwrap_or(0); // KB

        CacheStats {
            enabled: true,
            cache_dir: self.base_dir.clone(),
            search_count,
            ai_count,
            search_size_kb: search_size,
            ai_size_kb: ai_size,
            total_size_kb: search_size + ai_size,
            ttl_search: Duration::from_secs(self.config.search_ttl_seconds),
            ttl_embedding: Duration::from_secs(self.config.embedding_ttl_seconds),
        }
    }

    /// Calculate the total size of a directory
    #[allow(clippy::only_used_in_recursion)]
    fn dir_size(&self, path: &Path) -> Result<u64, std::io::Error> {
        let mut size = 0;
        if let Ok(entries) = path.read_dir() {
            for entry in entries.flatten() {
                size += if entry.path().is_dir() {
                    self.dir_size(&entry.path()).unwrap_or(0)
                } else {
                    entry.metadata().map(|m| m.len()).unwrap_or(0)
                };
            }
        }
        Ok(size)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Cache directory path
    pub cache_dir: PathBuf,

    /// Number of cached search results
    pub search_count: usize,

    /// Number of cached AI outputs
    pub ai_count: usize,

    /// Size of search cache in KB
    pub search_size_kb: u64,

    /// Size of AI cache in KB
    pub ai_size_kb: u64,

    /// Total size in KB
    pub total_size_kb: u64,

    /// TTL for search results
    pub ttl_search: Duration,

    /// TTL for embeddings
    pub ttl_embedding: Duration,
}

impl CacheStats {
    /// Return stats indicating cache is disabled
    fn disabled() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::new(),
            search_count: 0,
            ai_count: 0,
            search_size_kb: 0,
            ai_size_kb: 0,
            total_size_kb: 0,
            ttl_search: Duration::ZERO,
            ttl_embedding: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache_config(dir: &TempDir) -> CacheConfig {
        CacheConfig {
            enabled: true,
            directory: Some(dir.path().to_path_buf()),
            search_ttl_seconds: 60,
            embedding_ttl_seconds: 60,
            enrich_ttl_seconds: 60,
        }
    }

    #[test]
    fn test_cache_search() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheService::from_config(test_cache_config(&temp_dir));
        cache.initialize().unwrap();

        let response = SearchResponse::new(vec![], "pubmed", "test query");
        let query = SearchQuery::new("test query");

        cache.set_search("pubmed", &query, &response);

        match cache.get_search(&query, "pubmed") {
            CacheResult::Hit(r) => {
                assert_eq!(r.source, "pubmed");
                assert_eq!(r.query, "test query");
            }
            _ => panic!("Expected cache hit"),
        }

        // Different query should be a miss
        let query2 = SearchQuery::new("different query");
        assert!(matches!(
            cache.get_search(&query2, "pubmed"),
            CacheResult::Miss
        ));
    }

    #[test]
    fn test_cache_ai_embedding() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheService::from_config(test_cache_config(&temp_dir));
        cache.initialize().unwrap();

        let embedding: Vec<f32> = vec![0.1, 0.2, 0.3];
        cache.set_ai(AiCacheKind::Embedding, "some abstract text", &embedding);

        match cache.get_ai::<Vec<f32>>(AiCacheKind::Embedding, "some abstract text") {
            CacheResult::Hit(e) => assert_eq!(e, embedding),
            _ => panic!("Expected cache hit"),
        }

        // Same text under a different kind is a separate entry
        assert!(matches!(
            cache.get_ai::<String>(AiCacheKind::Summary, "some abstract text"),
            CacheResult::Miss
        ));
    }

    #[test]
    fn test_cache_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let config = CacheConfig {
            enabled: false,
            ..test_cache_config(&temp_dir)
        };
        let cache = CacheService::from_config(config);

        let response = SearchResponse::new(vec![], "pubmed", "test query");
        let query = SearchQuery::new("test query");

        cache.set_search("pubmed", &query, &response);
        assert!(matches!(
            cache.get_search(&query, "pubmed"),
            CacheResult::Miss
        ));
    }

    #[test]
    fn test_cache_expiration() {
        let temp_dir = TempDir::new().unwrap();
        let config = CacheConfig {
            search_ttl_seconds: 0, // Immediate expiration
            ..test_cache_config(&temp_dir)
        };
        let cache = CacheService::from_config(config);
        cache.initialize().unwrap();

        let response = SearchResponse::new(vec![], "pubmed", "test query");
        let query = SearchQuery::new("test query");

        cache.set_search("pubmed", &query, &response);
        assert!(matches!(
            cache.get_search(&query, "pubmed"),
            CacheResult::Expired
        ));
    }

    #[test]
    fn test_cache_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheService::from_config(test_cache_config(&temp_dir));
        cache.initialize().unwrap();

        let query = SearchQuery::new("test query");
        cache.set_search("pubmed", &query, &SearchResponse::new(vec![], "pubmed", "test query"));
        assert_eq!(cache.stats().search_count, 1);

        cache.clear_all().unwrap();
        assert_eq!(cache.stats().search_count, 0);
    }
}
