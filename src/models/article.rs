//! Article model representing a bibliographic record from any source.

use serde::{Deserialize, Serialize};

/// The bibliographic source where the article was found
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    PubMed,
    SemanticScholar,
    CrossRef,
    #[serde(untagged)]
    Other(String),
}

impl SourceType {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceType::PubMed => "PubMed",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::CrossRef => "CrossRef",
            SourceType::Other(s) => s,
        }
    }

    /// Returns the source identifier (used in CLI flags and cache keys)
    pub fn id(&self) -> &str {
        match self {
            SourceType::PubMed => "pubmed",
            SourceType::SemanticScholar => "semantic",
            SourceType::CrossRef => "crossref",
            SourceType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A bibliographic article from any source
///
/// This struct provides a standardized format for records across all sources,
/// so the aggregator can merge PubMed, Semantic Scholar and CrossRef results
/// without caring where a record came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Source-specific identifier (PMID, S2 paper id, DOI for CrossRef)
    pub article_id: String,

    /// Article title
    pub title: String,

    /// Authors (semicolon-separated)
    pub authors: String,

    /// Abstract text (empty when the source did not return one)
    pub r#abstract: String,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Journal or venue name
    pub journal: Option<String>,

    /// Publication date as a string (year or ISO date, never a structured date)
    pub published_date: Option<String>,

    /// Article page URL
    pub url: String,

    /// Source where the article was found
    pub source: SourceType,
}

impl Article {
    /// Create a new article with required fields
    pub fn new(article_id: String, title: String, url: String, source: SourceType) -> Self {
        Self {
            article_id,
            title,
            authors: String::new(),
            r#abstract: String::new(),
            doi: None,
            journal: None,
            published_date: None,
            url,
            source,
        }
    }

    /// Returns the primary identifier for this article (DOI if available, else article_id)
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.article_id)
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the source returned usable abstract text
    pub fn has_abstract(&self) -> bool {
        !self.r#abstract.trim().is_empty()
    }

    /// Publication year, when the date string starts with one
    pub fn year(&self) -> Option<u32> {
        self.published_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}

/// Builder for constructing Article objects
#[derive(Debug, Clone)]
pub struct ArticleBuilder {
    article: Article,
}

impl ArticleBuilder {
    /// Create a new builder with required fields
    pub fn new(
        article_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceType,
    ) -> Self {
        Self {
            article: Article::new(article_id.into(), title.into(), url.into(), source),
        }
    }

    /// Set authors
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.article.authors = authors.into();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.article.r#abstract = abstract_text.into();
        self
    }

    /// Set DOI (empty strings are treated as absent)
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        self.article.doi = if doi.is_empty() { None } else { Some(doi) };
        self
    }

    /// Set journal name
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        let journal = journal.into();
        self.article.journal = if journal.is_empty() {
            None
        } else {
            Some(journal)
        };
        self
    }

    /// Set publication date
    pub fn published_date(mut self, date: impl Into<String>) -> Self {
        let date = date.into();
        self.article.published_date = if date.is_empty() { None } else { Some(date) };
        self
    }

    /// Build the Article
    pub fn build(self) -> Article {
        self.article
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_builder() {
        let article = ArticleBuilder::new(
            "12345678",
            "Test Article",
            "https://pubmed.ncbi.nlm.nih.gov/12345678/",
            SourceType::PubMed,
        )
        .authors("Jane Doe; John Smith")
        .abstract_text("This is a test abstract.")
        .doi("10.1234/test.1234")
        .journal("Journal of Testing")
        .published_date("2023")
        .build();

        assert_eq!(article.article_id, "12345678");
        assert_eq!(article.title, "Test Article");
        assert_eq!(article.doi, Some("10.1234/test.1234".to_string()));
        assert_eq!(article.journal, Some("Journal of Testing".to_string()));
        assert_eq!(article.year(), Some(2023));
        assert!(article.has_abstract());
    }

    #[test]
    fn test_empty_optional_fields() {
        let article = ArticleBuilder::new("1", "Test", "https://example.com", SourceType::CrossRef)
            .doi("")
            .journal("")
            .published_date("")
            .build();

        assert!(article.doi.is_none());
        assert!(article.journal.is_none());
        assert!(article.published_date.is_none());
        assert!(!article.has_abstract());
    }

    #[test]
    fn test_author_list() {
        let article = ArticleBuilder::new("1", "Test", "https://example.com", SourceType::PubMed)
            .authors("Jane Doe; John Smith; Bob Jones")
            .build();

        assert_eq!(article.author_list(), vec!["Jane Doe", "John Smith", "Bob Jones"]);
    }

    #[test]
    fn test_primary_id() {
        let with_doi = ArticleBuilder::new("1", "Test", "https://example.com", SourceType::PubMed)
            .doi("10.1234/test")
            .build();
        assert_eq!(with_doi.primary_id(), "10.1234/test");

        let without_doi =
            Article::new("1".into(), "Test".into(), "https://example.com".into(), SourceType::PubMed);
        assert_eq!(without_doi.primary_id(), "1");
    }

    #[test]
    fn test_year_from_iso_date() {
        let article = ArticleBuilder::new("1", "Test", "https://example.com", SourceType::CrossRef)
            .published_date("2021-06-15")
            .build();
        assert_eq!(article.year(), Some(2021));
    }
}
