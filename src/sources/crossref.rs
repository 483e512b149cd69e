//! CrossRef literature source implementation.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Article, ArticleBuilder, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef literature source
///
/// Uses the CrossRef REST API for DOI metadata lookup and search. A contact
/// email in the user agent puts requests in CrossRef's polite pool.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
}

impl CrossRefSource {
    /// Create a new CrossRef source with an optional polite-pool contact email
    pub fn new(mailto: Option<String>) -> Result<Self, SourceError> {
        let user_agent = match mailto {
            Some(email) => format!(
                "{}/{} (mailto:{})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                email
            ),
            None => format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        };
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
        })
    }

    /// Strip JATS markup from a CrossRef abstract
    fn clean_abstract(raw: &str) -> String {
        // Abstracts come back as JATS XML fragments
        match Regex::new(r"</?jats:[^>]+>|</?[a-zA-Z][^>]*>") {
            Ok(re) => re.replace_all(raw, " ").split_whitespace().collect::<Vec<_>>().join(" "),
            Err(_) => raw.to_string(),
        }
    }

    /// Convert a CrossRef work item to an article
    fn parse_article(item: &CRItem) -> Option<Article> {
        let title = item.title.first().cloned().unwrap_or_default();
        if title.is_empty() {
            return None;
        }

        let authors = item
            .author
            .iter()
            .map(|a| {
                match (&a.given, &a.family) {
                    (Some(given), Some(family)) => format!("{} {}", given, family),
                    (None, Some(family)) => family.clone(),
                    (Some(given), None) => given.clone(),
                    (None, None) => String::new(),
                }
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        let doi = item.doi.clone().unwrap_or_default();

        let url = item
            .url
            .clone()
            .unwrap_or_else(|| format!("https://doi.org/{}", doi));

        let published_date = item
            .published_print
            .as_ref()
            .or(item.published_online.as_ref())
            .and_then(|d| d.date_parts.first())
            .map(|parts| {
                parts
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .unwrap_or_default();

        let journal = item.container_title.first().cloned().unwrap_or_default();

        let abstract_text = item
            .r#abstract
            .as_deref()
            .map(Self::clean_abstract)
            .unwrap_or_default();

        Some(
            ArticleBuilder::new(doi.clone(), title, url, SourceType::CrossRef)
                .authors(authors)
                .abstract_text(abstract_text)
                .doi(doi)
                .journal(journal)
                .published_date(published_date)
                .build(),
        )
    }

    /// Fetch a CrossRef endpoint with retry
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);
        let url_for_retry = url.to_string();

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url_for_retry.clone();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to query CrossRef: {}", e)))?;

                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound("DOI not found".to_string()));
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "CrossRef API returned status: {}",
                        status
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let mut url = format!(
            "{}/works?query={}&rows={}",
            CROSSREF_API_BASE,
            urlencoding::encode(&query.query),
            query.max_results
        );

        if let Some(year) = &query.year {
            if year.contains('-') {
                let parts: Vec<&str> = year.splitn(2, '-').collect();
                if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                    url.push_str(&format!(
                        "&filter=from-pub-date:{}-01-01,until-pub-date:{}-12-31",
                        parts[0], parts[1]
                    ));
                }
            } else {
                url.push_str(&format!(
                    "&filter=from-pub-date:{}-01-01,until-pub-date:{}-12-31",
                    year, year
                ));
            }
        }

        if let Some(author) = &query.author {
            url.push_str(&format!("&query.author={}", urlencoding::encode(author)));
        }

        let body = self.fetch_text(&url).await?;
        let data: CRSearchResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let articles: Vec<Article> = data
            .message
            .items
            .iter()
            .filter_map(Self::parse_article)
            .collect();

        Ok(SearchResponse::new(articles, "crossref", &query.query)
            .total_results(data.message.total_results))
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Article, SourceError> {
        let url = format!("{}/works/{}", CROSSREF_API_BASE, urlencoding::encode(doi));

        let body = self.fetch_text(&url).await?;
        let data: CRWorkResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Self::parse_article(&data.message)
            .ok_or_else(|| SourceError::NotFound(format!("No usable record for DOI {}", doi)))
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRSearchResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRWorkResponse {
    message: CRItem,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(rename = "total-results", default)]
    total_results: usize,
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    r#abstract: Option<String>,
    #[serde(rename = "published-print")]
    published_print: Option<CRDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CRDate>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i32>>,
}
