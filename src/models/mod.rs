//! Core data models for articles, search operations and AI enrichment.

mod article;
mod enrich;
mod search;

pub use article::{Article, ArticleBuilder, SourceType};
pub use enrich::{Categories, TrendReport};
pub use search::{SearchQuery, SearchResponse};
