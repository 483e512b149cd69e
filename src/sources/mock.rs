//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{Article, ArticleBuilder, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// A mock source for testing that returns predefined responses.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    search_response: Mutex<Option<SearchResponse>>,
    doi_articles: Mutex<HashMap<String, Article>>,
    fail_searches: Mutex<bool>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::with_id("mock")
    }

    /// Create a mock source with a custom ID, so several can coexist
    /// in one registry.
    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            search_response: Mutex::new(None),
            doi_articles: Mutex::new(HashMap::new()),
            fail_searches: Mutex::new(false),
        }
    }

    /// Set the search response to return.
    pub fn set_search_response(&self, response: SearchResponse) {
        let mut guard = self.search_response.lock().unwrap();
        *guard = Some(response);
    }

    /// Register an article to be returned from DOI lookups.
    pub fn set_doi_article(&self, doi: &str, article: Article) {
        let mut guard = self.doi_articles.lock().unwrap();
        guard.insert(doi.to_lowercase(), article);
    }

    /// Make all subsequent searches fail with an API error.
    pub fn fail_searches(&self, fail: bool) {
        let mut guard = self.fail_searches.lock().unwrap();
        *guard = fail;
    }

    /// Clear the configured response.
    pub fn clear_response(&self) {
        let mut guard = self.search_response.lock().unwrap();
        *guard = None;
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        if *self.fail_searches.lock().unwrap() {
            return Err(SourceError::Api("mock failure".to_string()));
        }

        let guard = self.search_response.lock().unwrap();
        match &*guard {
            Some(response) => Ok(response.clone()),
            None => Ok(SearchResponse::new(Vec::new(), &self.id, &query.query)),
        }
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Article, SourceError> {
        let guard = self.doi_articles.lock().unwrap();
        guard
            .get(&doi.to_lowercase())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(doi.to_string()))
    }
}

/// Helper function to create a mock article for testing.
pub fn make_article(article_id: &str, title: &str, source_type: SourceType) -> Article {
    ArticleBuilder::new(
        article_id,
        title,
        format!("http://example.com/{}", article_id),
        source_type,
    )
    .build()
}
