//! AI enrichment: embeddings, summaries, categorization and trend analysis.
//!
//! All AI calls go through an OpenAI-compatible API. When no API key is
//! configured the enrichment layer degrades to deterministic fallbacks so
//! the rest of the pipeline keeps working.

mod client;
mod enrich;
mod quota;
mod similarity;
mod trends;

pub use client::AiClient;
pub use enrich::Enricher;
pub use quota::{QuotaTracker, RequestKind};
pub use similarity::{cosine_similarity, rank_similar, SimilarArticle};
pub use trends::TrendAnalyzer;

/// Errors from the AI enrichment layer
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// AI enrichment is disabled (no API key or turned off in config)
    #[error("AI enrichment is disabled")]
    Disabled,

    /// Per-minute request quota exhausted
    #[error("AI request quota exceeded for {0}")]
    QuotaExceeded(String),

    /// Network or HTTP error
    #[error("AI network error: {0}")]
    Network(String),

    /// The API answered with a non-success status
    #[error("AI API error: {0}")]
    Api(String),

    /// The response body could not be parsed
    #[error("AI response parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Parse(err.to_string())
    }
}
