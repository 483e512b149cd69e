//! Bibliographic source plugins with extensible trait-based architecture.
//!
//! This module defines the [`Source`] trait that all literature sources
//! implement. New sources can be added by implementing this trait and
//! registering them with the [`SourceRegistry`].
//!
//! # Feature Flags
//!
//! Individual sources can be disabled at compile time using Cargo features:
//!
//! - `pubmed` - Enable PubMed source (default: enabled)
//! - `semantic` - Enable Semantic Scholar source (default: enabled)
//! - `crossref` - Enable CrossRef source (default: enabled)

#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;
#[cfg(feature = "source-semantic")]
mod semantic;

pub mod mock;

pub use mock::MockSource;

#[cfg(feature = "source-crossref")]
pub use crossref::CrossRefSource;
#[cfg(feature = "source-pubmed")]
pub use pubmed::PubMedSource;
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

pub use registry::{SourceCapabilities, SourceRegistry};

use crate::models::{Article, SearchQuery, SearchResponse};
use async_trait::async_trait;

/// The Source trait defines the interface for all literature source plugins.
///
/// # Implementing a New Source
///
/// To add a new literature source:
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement the required methods (at minimum `id`, `name`, and `search`)
/// 3. Implement optional methods if the source supports them
/// 4. Add the source to `SourceRegistry::new()` or register it dynamically
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "pubmed", "crossref")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source supports search
    fn supports_search(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::SEARCH)
    }

    /// Whether this source supports lookup by DOI
    fn supports_doi_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::DOI_LOOKUP)
    }

    /// Whether this source supports author search
    fn supports_author_search(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::AUTHOR_SEARCH)
    }

    // ========== SEARCH METHODS ==========

    /// Search for articles matching the query. Author and year filters
    /// travel inside the query.
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Err(SourceError::NotImplemented)
    }

    // ========== LOOKUP METHODS ==========

    /// Get an article by its DOI
    async fn get_by_doi(&self, _doi: &str) -> Result<Article, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Get an article by its ID (source-specific)
    async fn get_by_id(&self, _id: &str) -> Result<Article, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_capabilities() {
        let caps = SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP;

        assert!(caps.contains(SourceCapabilities::SEARCH));
        assert!(caps.contains(SourceCapabilities::DOI_LOOKUP));
        assert!(!caps.contains(SourceCapabilities::AUTHOR_SEARCH));
    }
}
