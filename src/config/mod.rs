//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Search and aggregation settings
    #[serde(default)]
    pub search: SearchConfig,

    /// AI enrichment settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// AI request quota budgets
    #[serde(default)]
    pub quotas: QuotaConfig,

    /// Background batch processor settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// OpenAI-compatible API key for embeddings and chat completions
    #[serde(default)]
    pub openai: Option<String>,

    /// NCBI E-utilities API key (optional, for higher rate limits)
    #[serde(default)]
    pub pubmed: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_scholar: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            pubmed: std::env::var("PUBMED_API_KEY").ok(),
            semantic_scholar: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
        }
    }
}

/// Search and aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of merged results to return
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Floor for the per-source result budget when splitting a query
    #[serde(default = "default_per_source_floor")]
    pub per_source_floor: usize,

    /// Maximum DOI lookups spent backfilling missing abstracts per query
    #[serde(default = "default_backfill_budget")]
    pub abstract_backfill_budget: usize,

    /// Contact email for the CrossRef polite pool
    #[serde(default)]
    pub crossref_mailto: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            per_source_floor: default_per_source_floor(),
            abstract_backfill_budget: default_backfill_budget(),
            crossref_mailto: std::env::var("CROSSREF_MAILTO").ok(),
        }
    }
}

fn default_max_results() -> usize {
    10
}

fn default_per_source_floor() -> usize {
    3
}

fn default_backfill_budget() -> usize {
    5
}

/// AI enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Whether AI enrichment is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    /// Model used for chat completions (summaries, categories, trends)
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_ai_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory (defaults to the platform cache dir)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// TTL for cached search results, in seconds
    #[serde(default = "default_search_ttl")]
    pub search_ttl_seconds: u64,

    /// TTL for cached embeddings, in seconds (30 days)
    #[serde(default = "default_embedding_ttl")]
    pub embedding_ttl_seconds: u64,

    /// TTL for cached summaries and categorizations, in seconds (7 days)
    #[serde(default = "default_enrich_ttl")]
    pub enrich_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            search_ttl_seconds: default_search_ttl(),
            embedding_ttl_seconds: default_embedding_ttl(),
            enrich_ttl_seconds: default_enrich_ttl(),
        }
    }
}

fn default_search_ttl() -> u64 {
    1800
}

fn default_embedding_ttl() -> u64 {
    30 * 24 * 3600
}

fn default_enrich_ttl() -> u64 {
    7 * 24 * 3600
}

/// Per-minute AI request quota budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Embedding requests permitted per minute
    #[serde(default = "default_embeddings_per_minute")]
    pub embeddings_per_minute: u32,

    /// Chat completion requests permitted per minute
    #[serde(default = "default_completions_per_minute")]
    pub completions_per_minute: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            embeddings_per_minute: default_embeddings_per_minute(),
            completions_per_minute: default_completions_per_minute(),
        }
    }
}

fn default_embeddings_per_minute() -> u32 {
    50
}

fn default_completions_per_minute() -> u32 {
    10
}

/// Background batch processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Articles processed per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between processing cycles
    #[serde(default = "default_batch_interval")]
    pub interval_seconds: u64,

    /// Delay between AI requests inside one cycle, in milliseconds
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_seconds: default_batch_interval(),
            request_delay_ms: default_request_delay(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_interval() -> u64 {
    300
}

fn default_request_delay() -> u64 {
    500
}

/// Default cache directory: `~/.cache/pharma-research` (or platform equivalent)
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pharma-research")
}

/// Look for a config file in the conventional locations
pub fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        Some(PathBuf::from("pharma-research.toml")),
        dirs::config_dir().map(|d| d.join("pharma-research").join("config.toml")),
    ];

    candidates.into_iter().flatten().find(|p| p.exists())
}

/// Load configuration from a file plus environment overrides
pub fn load_config(path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("PHARMA_RESEARCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut cfg: Config = settings.try_deserialize()?;

    // Conventional env vars still win over absent config entries
    if cfg.api_keys.openai.is_none() {
        cfg.api_keys.openai = std::env::var("OPENAI_API_KEY").ok();
    }
    if cfg.api_keys.semantic_scholar.is_none() {
        cfg.api_keys.semantic_scholar = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok();
    }
    if cfg.api_keys.pubmed.is_none() {
        cfg.api_keys.pubmed = std::env::var("PUBMED_API_KEY").ok();
    }

    Ok(cfg)
}

/// Get the effective configuration: file if present, env overrides, else defaults
pub fn get_config() -> Config {
    match load_config(find_config_file().as_ref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load configuration, using defaults: {}", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.default_max_results, 10);
        assert_eq!(config.search.per_source_floor, 3);
        assert_eq!(config.quotas.embeddings_per_minute, 50);
        assert_eq!(config.quotas.completions_per_minute, 10);
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.interval_seconds, 300);
    }

    #[test]
    fn test_cache_ttl_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.embedding_ttl_seconds, 30 * 24 * 3600);
        assert_eq!(config.enrich_ttl_seconds, 7 * 24 * 3600);
        assert!(config.enabled);
    }

    #[test]
    fn test_ai_defaults() {
        let config = AiConfig::default();
        assert!(config.enabled);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }
}
