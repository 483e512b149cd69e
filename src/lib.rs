//! # Pharma Research
//!
//! A pharmaceutical literature search aggregator. Queries PubMed, Semantic
//! Scholar and CrossRef in parallel, merges and deduplicates the results,
//! and enriches them with AI summaries, therapeutic categories, embeddings
//! and topic trend reports.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Article, SearchQuery, etc.)
//! - [`sources`]: Literature source plugins with extensible trait-based architecture
//! - [`aggregator`]: Parallel fan-out, merging, deduplication and abstract backfill
//! - [`store`]: In-memory article store with DOI-keyed upserts
//! - [`ai`]: Embeddings, summaries, categorization and trend analysis
//! - [`batch`]: Background enrichment worker
//! - [`utils`]: HTTP client, caching, deduplication, and other utilities
//! - [`config`]: Configuration management

pub mod aggregator;
pub mod ai;
pub mod batch;
pub mod config;
pub mod models;
pub mod sources;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use models::Article;
pub use sources::{Source, SourceRegistry};
pub use store::ArticleStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
