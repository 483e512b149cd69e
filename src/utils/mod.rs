//! Utility modules for caching, deduplication, HTTP and retry logic.

pub mod cache;
pub mod dedup;
pub mod http;
pub mod retry;

pub use cache::{AiCacheKind, CacheResult, CacheService, CacheStats};
pub use dedup::{deduplicate_articles, normalize_title, DuplicateStrategy};
pub use http::HttpClient;
pub use retry::{api_retry_config, with_retry, RetryConfig, TransientError};
