//! Semantic Scholar literature source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Article, ArticleBuilder, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for every paper payload
const PAPER_FIELDS: &str = "title,abstract,authors,year,venue,externalIds,url";

/// Semantic Scholar literature source
///
/// Uses the Semantic Scholar Graph API. An optional API key raises the
/// permitted request rate.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_key,
        })
    }

    /// Create with a custom HTTP client (for testing)
    #[allow(dead_code)]
    pub fn with_client(client: Arc<HttpClient>, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", SEMANTIC_API_BASE, endpoint)
    }

    /// Fetch an endpoint with retry, parsing the JSON body
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, SourceError> {
        let url = self.build_url(endpoint);
        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();

        let body = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let api_key = api_key.clone();
            async move {
                let mut builder = client.get(&url);
                if let Some(ref key) = api_key {
                    builder = builder.header("x-api-key", key);
                }

                let response = builder.send().await.map_err(|e| {
                    SourceError::Network(format!("Failed to query Semantic Scholar: {}", e))
                })?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound("Record not found".to_string()));
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "Semantic Scholar API returned status: {}",
                        status
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await?;

        serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))
    }

    /// Convert a Semantic Scholar paper payload to an article
    fn parse_article(data: &S2Paper) -> Article {
        let authors = data
            .authors
            .iter()
            .filter_map(|a| a.name.as_deref())
            .collect::<Vec<_>>()
            .join("; ");

        let published_date = data.year.map(|y| y.to_string());

        let doi = data
            .external_ids
            .as_ref()
            .and_then(|ids| ids.doi.clone())
            .unwrap_or_default();

        let url = data.url.clone().unwrap_or_else(|| {
            if !doi.is_empty() {
                format!("https://doi.org/{}", doi)
            } else {
                String::new()
            }
        });

        let article_id = data.paper_id.clone().unwrap_or_default();

        ArticleBuilder::new(
            article_id,
            data.title.clone().unwrap_or_default(),
            url,
            SourceType::SemanticScholar,
        )
        .authors(authors)
        .abstract_text(data.r#abstract.clone().unwrap_or_default())
        .doi(doi)
        .journal(data.venue.clone().unwrap_or_default())
        .published_date(published_date.unwrap_or_default())
        .build()
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DOI_LOOKUP
            | SourceCapabilities::AUTHOR_SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let mut search_term = query.query.clone();
        if let Some(author) = &query.author {
            search_term = format!("{} {}", search_term, author);
        }

        let mut endpoint = format!(
            "/paper/search?query={}&limit={}&fields={}",
            urlencoding::encode(search_term.trim()),
            query.max_results,
            PAPER_FIELDS
        );
        if let Some(year) = &query.year {
            endpoint.push_str(&format!("&year={}", urlencoding::encode(year)));
        }

        // Degrade gracefully when the shared public pool is throttled
        let data: S2SearchResponse = match self.fetch_json(&endpoint).await {
            Ok(d) => d,
            Err(SourceError::RateLimit) => {
                tracing::debug!("Semantic Scholar rate-limited - returning empty results");
                return Ok(SearchResponse::new(vec![], "semantic", &query.query));
            }
            Err(e) => return Err(e),
        };

        let articles: Vec<Article> = data.data.iter().map(Self::parse_article).collect();

        let mut response = SearchResponse::new(articles, "semantic", &query.query);
        if let Some(total) = data.total {
            response = response.total_results(total);
        }
        Ok(response)
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Article, SourceError> {
        let endpoint = format!(
            "/paper/DOI:{}?fields={}",
            urlencoding::encode(doi),
            PAPER_FIELDS
        );

        let data: S2Paper = self.fetch_json(&endpoint).await?;
        Ok(Self::parse_article(&data))
    }

    async fn get_by_id(&self, id: &str) -> Result<Article, SourceError> {
        let endpoint = format!("/paper/{}?fields={}", urlencoding::encode(id), PAPER_FIELDS);
        let data: S2Paper = self.fetch_json(&endpoint).await?;
        Ok(Self::parse_article(&data))
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2Paper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    url: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<S2ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
    total: Option<usize>,
}
