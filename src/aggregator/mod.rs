//! Multi-source search aggregation.
//!
//! Fans a query out to every searchable source in parallel, merges the
//! results, removes duplicates across sources and backfills missing
//! abstracts through DOI lookups.

use futures_util::future::join_all;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::models::{Article, SearchQuery, SearchResponse};
use crate::sources::{Source, SourceCapabilities, SourceRegistry};
use crate::utils::{deduplicate_articles, CacheResult, CacheService, DuplicateStrategy};

/// Outcome of an aggregated search
#[derive(Debug, Clone)]
pub struct AggregatedSearch {
    /// Merged, deduplicated articles (offset and limit already applied)
    pub articles: Vec<Article>,

    /// Number of unique articles before offset/limit slicing
    pub total_unique: usize,

    /// Sources that answered, with their raw result counts
    pub source_counts: Vec<(String, usize)>,

    /// Sources that failed (the query still succeeds without them)
    pub failed_sources: Vec<String>,
}

/// Aggregates searches across all registered sources
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    cache: Arc<CacheService>,
    config: SearchConfig,
}

impl Aggregator {
    /// Create a new aggregator
    pub fn new(registry: Arc<SourceRegistry>, cache: Arc<CacheService>, config: SearchConfig) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    /// Per-source result budget: split the requested limit across sources,
    /// but never ask a source for fewer than the configured floor.
    fn per_source_limit(&self, requested: usize, source_count: usize) -> usize {
        if source_count == 0 {
            return requested;
        }
        std::cmp::max(requested / source_count, self.config.per_source_floor)
    }

    /// Search one source, consulting the cache first
    async fn search_source(
        &self,
        source: &Arc<dyn Source>,
        query: &SearchQuery,
    ) -> Result<SearchResponse, crate::sources::SourceError> {
        if let CacheResult::Hit(cached) = self.cache.get_search(query, source.id()) {
            return Ok(cached);
        }

        let response = source.search(query).await?;
        self.cache.set_search(source.id(), query, &response);
        Ok(response)
    }

    /// Run a search across all searchable sources and merge the results.
    ///
    /// Sources are queried in parallel; a failing source is logged and
    /// skipped, never aborting the merge. Duplicates are removed with DOI
    /// matching first, then fuzzy title matching, keeping the first
    /// occurrence. The offset and limit are applied after deduplication.
    pub async fn search(&self, query: &SearchQuery) -> AggregatedSearch {
        let sources = self.registry.searchable();
        let per_source = self.per_source_limit(query.max_results, sources.len());

        let per_source_query = SearchQuery {
            max_results: per_source,
            offset: 0,
            ..query.clone()
        };

        tracing::debug!(
            "Fanning out to {} sources ({} results each)",
            sources.len(),
            per_source
        );

        let futures = sources.iter().map(|source| {
            let query = per_source_query.clone();
            async move { (source.id().to_string(), self.search_source(source, &query).await) }
        });

        let results = join_all(futures).await;

        let mut merged: Vec<Article> = Vec::new();
        let mut source_counts = Vec::new();
        let mut failed_sources = Vec::new();

        for (source_id, result) in results {
            match result {
                Ok(response) => {
                    tracing::debug!("{}: {} results", source_id, response.articles.len());
                    source_counts.push((source_id, response.articles.len()));
                    merged.extend(response.articles);
                }
                Err(e) => {
                    tracing::warn!("Source {} failed, skipping: {}", source_id, e);
                    failed_sources.push(source_id);
                }
            }
        }

        let mut unique = deduplicate_articles(merged, DuplicateStrategy::First);
        let total_unique = unique.len();

        self.backfill_abstracts(&mut unique).await;

        // Offset and limit apply to the deduplicated list
        let articles: Vec<Article> = unique
            .into_iter()
            .skip(query.offset)
            .take(query.max_results)
            .collect();

        AggregatedSearch {
            articles,
            total_unique,
            source_counts,
            failed_sources,
        }
    }

    /// Fill in missing abstracts via DOI lookups against lookup-capable
    /// sources, spending at most the configured lookup budget.
    async fn backfill_abstracts(&self, articles: &mut [Article]) {
        let lookup_sources = self.registry.with_capability(SourceCapabilities::DOI_LOOKUP);
        if lookup_sources.is_empty() {
            return;
        }

        let mut budget = self.config.abstract_backfill_budget;

        for article in articles.iter_mut() {
            if budget == 0 {
                break;
            }
            if article.has_abstract() {
                continue;
            }
            let Some(doi) = article.doi.clone() else {
                continue;
            };

            budget -= 1;

            for source in &lookup_sources {
                // The record's own source already failed to supply an abstract
                if source.id() == article.source.id() {
                    continue;
                }

                match source.get_by_doi(&doi).await {
                    Ok(found) if found.has_abstract() => {
                        tracing::debug!("Backfilled abstract for {} from {}", doi, source.id());
                        article.r#abstract = found.r#abstract;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("DOI lookup for {} on {} failed: {}", doi, source.id(), e);
                    }
                }
            }
        }
    }

    /// Look up a single article by DOI, trying each capable source in turn
    pub async fn get_by_doi(&self, doi: &str) -> Option<Article> {
        for source in self.registry.with_capability(SourceCapabilities::DOI_LOOKUP) {
            match source.get_by_doi(doi).await {
                Ok(article) => return Some(article),
                Err(e) => {
                    tracing::debug!("DOI lookup on {} failed: {}", source.id(), e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::models::{ArticleBuilder, SourceType};
    use crate::sources::{mock::make_article, MockSource};

    fn test_aggregator(registry: SourceRegistry) -> Aggregator {
        let cache = CacheService::from_config(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        Aggregator::new(
            Arc::new(registry),
            Arc::new(cache),
            SearchConfig::default(),
        )
    }

    fn registry_with_mocks(mocks: Vec<MockSource>) -> SourceRegistry {
        let mut registry = SourceRegistry::empty();
        for mock in mocks {
            registry.register(Arc::new(mock));
        }
        registry
    }

    #[tokio::test]
    async fn test_merge_and_dedup() {
        let mock_a = MockSource::with_id("mock-a");
        mock_a.set_search_response(SearchResponse::new(
            vec![
                ArticleBuilder::new("1", "Shared Article", "http://a/1", SourceType::PubMed)
                    .doi("10.1/shared")
                    .build(),
                make_article("2", "Only In A", SourceType::PubMed),
            ],
            "mock-a",
            "q",
        ));

        let mock_b = MockSource::with_id("mock-b");
        mock_b.set_search_response(SearchResponse::new(
            vec![ArticleBuilder::new(
                "3",
                "Shared Article",
                "http://b/3",
                SourceType::SemanticScholar,
            )
            .doi("10.1/shared")
            .build()],
            "mock-b",
            "q",
        ));

        let aggregator = test_aggregator(registry_with_mocks(vec![mock_a, mock_b]));
        let result = aggregator.search(&SearchQuery::new("q")).await;

        assert_eq!(result.total_unique, 2);
        assert!(result.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_does_not_abort() {
        let healthy = MockSource::with_id("mock-a");
        healthy.set_search_response(SearchResponse::new(
            vec![make_article("1", "Result", SourceType::PubMed)],
            "mock-a",
            "q",
        ));

        let failing = MockSource::with_id("mock-b");
        failing.fail_searches(true);

        let aggregator = test_aggregator(registry_with_mocks(vec![healthy, failing]));
        let result = aggregator.search(&SearchQuery::new("q")).await;

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.failed_sources, vec!["mock-b".to_string()]);
    }

    #[tokio::test]
    async fn test_offset_and_limit_after_dedup() {
        let mock = MockSource::with_id("mock-a");
        let articles: Vec<_> = (0..5)
            .map(|i| make_article(&i.to_string(), &format!("Article {}", i), SourceType::PubMed))
            .collect();
        mock.set_search_response(SearchResponse::new(articles, "mock-a", "q"));

        let aggregator = test_aggregator(registry_with_mocks(vec![mock]));
        let result = aggregator
            .search(&SearchQuery::new("q").max_results(2).offset(2))
            .await;

        assert_eq!(result.total_unique, 5);
        assert_eq!(result.articles.len(), 2);
    }

    #[test]
    fn test_per_source_limit_floor() {
        let aggregator = test_aggregator(SourceRegistry::empty());

        assert_eq!(aggregator.per_source_limit(10, 3), 3);
        assert_eq!(aggregator.per_source_limit(30, 3), 10);
        assert_eq!(aggregator.per_source_limit(2, 3), 3); // floor wins
        assert_eq!(aggregator.per_source_limit(10, 0), 10);
    }
}
