//! Search request and response models.

use serde::{Deserialize, Serialize};

/// Search query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results to return after merging
    pub max_results: usize,

    /// Number of deduplicated results to skip (applied after merging)
    pub offset: usize,

    /// Year filter (single year, range like "2018-2022", or "2010-" for from, "-2015" for until)
    pub year: Option<String>,

    /// Author name filter
    pub author: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            offset: 0,
            year: None,
            author: None,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set result offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set year filter
    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Set author filter
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Search response containing articles and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Articles found
    pub articles: Vec<crate::models::Article>,

    /// Total number of results at the source (may be more than returned)
    pub total_results: Option<usize>,

    /// Source of the results
    pub source: String,

    /// Query that was executed
    pub query: String,
}

impl SearchResponse {
    /// Create a new search response
    pub fn new(
        articles: Vec<crate::models::Article>,
        source: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            articles,
            total_results: None,
            source: source.into(),
            query: query.into(),
        }
    }

    /// Set total results
    pub fn total_results(mut self, total: usize) -> Self {
        self.total_results = Some(total);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new("antibiotic resistance")
            .max_results(25)
            .offset(10)
            .year("2020-2023")
            .author("Smith J");

        assert_eq!(query.query, "antibiotic resistance");
        assert_eq!(query.max_results, 25);
        assert_eq!(query.offset, 10);
        assert_eq!(query.year.as_deref(), Some("2020-2023"));
        assert_eq!(query.author.as_deref(), Some("Smith J"));
    }

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("statins");
        assert_eq!(query.max_results, 10);
        assert_eq!(query.offset, 0);
        assert!(query.year.is_none());
        assert!(query.author.is_none());
    }
}
