//! Integration tests covering the search pipeline end to end: registry,
//! aggregation, deduplication, abstract backfill, the article store, AI
//! fallbacks and caching.

use std::sync::Arc;

use pharma_research::aggregator::Aggregator;
use pharma_research::ai::{rank_similar, AiClient, Enricher, QuotaTracker, TrendAnalyzer};
use pharma_research::batch::BatchProcessor;
use pharma_research::config::{
    AiConfig, BatchConfig, CacheConfig, QuotaConfig, SearchConfig,
};
use pharma_research::models::{ArticleBuilder, SearchQuery, SearchResponse, SourceType};
use pharma_research::sources::{mock::make_article, MockSource, SourceCapabilities, SourceRegistry};
use pharma_research::store::ArticleStore;
use pharma_research::utils::CacheService;

fn disabled_cache() -> Arc<CacheService> {
    Arc::new(CacheService::from_config(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    }))
}

fn mock_aggregator(mocks: Vec<MockSource>, cache: Arc<CacheService>) -> Aggregator {
    let mut registry = SourceRegistry::empty();
    for mock in mocks {
        registry.register(Arc::new(mock));
    }
    Aggregator::new(Arc::new(registry), cache, SearchConfig::default())
}

fn disabled_enricher() -> Enricher {
    let client = AiClient::new(&AiConfig::default(), None).unwrap();
    Enricher::new(
        client,
        disabled_cache(),
        Arc::new(QuotaTracker::new(&QuotaConfig::default())),
    )
}

#[test]
fn test_default_registry_has_all_sources() {
    let registry = SourceRegistry::new().unwrap();

    assert_eq!(registry.len(), 3);
    for id in ["pubmed", "semantic", "crossref"] {
        let source = registry.get(id).unwrap_or_else(|| panic!("missing {}", id));
        assert!(source.supports_search());
    }
    assert!(!registry.with_capability(SourceCapabilities::DOI_LOOKUP).is_empty());
}

#[tokio::test]
async fn test_search_merges_and_deduplicates_across_sources() {
    let mock_a = MockSource::with_id("mock-a");
    mock_a.set_search_response(SearchResponse::new(
        vec![
            ArticleBuilder::new("1", "Metformin Outcomes", "http://a/1", SourceType::PubMed)
                .doi("10.1/metformin")
                .abstract_text("Glycemic control improved.")
                .build(),
            make_article("2", "Statin Adherence", SourceType::PubMed),
        ],
        "mock-a",
        "diabetes",
    ));

    let mock_b = MockSource::with_id("mock-b");
    mock_b.set_search_response(SearchResponse::new(
        vec![ArticleBuilder::new(
            "s2-9",
            "Metformin Outcomes",
            "http://b/9",
            SourceType::SemanticScholar,
        )
        .doi("10.1/METFORMIN") // case-insensitive DOI match
        .build()],
        "mock-b",
        "diabetes",
    ));

    let aggregator = mock_aggregator(vec![mock_a, mock_b], disabled_cache());
    let result = aggregator.search(&SearchQuery::new("diabetes")).await;

    assert_eq!(result.total_unique, 2);
    assert_eq!(result.articles.len(), 2);
    assert!(result.failed_sources.is_empty());

    // The first occurrence wins the merge
    let kept = result
        .articles
        .iter()
        .find(|a| a.doi.as_deref() == Some("10.1/metformin"))
        .unwrap();
    assert_eq!(kept.source, SourceType::PubMed);
}

#[tokio::test]
async fn test_failing_source_is_skipped_not_fatal() {
    let healthy = MockSource::with_id("mock-a");
    healthy.set_search_response(SearchResponse::new(
        vec![make_article("1", "Only Result", SourceType::PubMed)],
        "mock-a",
        "q",
    ));
    let failing = MockSource::with_id("mock-b");
    failing.fail_searches(true);

    let aggregator = mock_aggregator(vec![healthy, failing], disabled_cache());
    let result = aggregator.search(&SearchQuery::new("q")).await;

    assert_eq!(result.articles.len(), 1);
    assert_eq!(result.failed_sources, vec!["mock-b".to_string()]);
}

#[tokio::test]
async fn test_abstract_backfill_uses_other_sources() {
    // mock-a returns a record with a DOI but no abstract
    let mock_a = MockSource::with_id("mock-a");
    mock_a.set_search_response(SearchResponse::new(
        vec![
            ArticleBuilder::new("1", "Sparse Record", "http://a/1", SourceType::PubMed)
                .doi("10.1/sparse")
                .build(),
        ],
        "mock-a",
        "q",
    ));

    // mock-b can resolve the same DOI with a full abstract
    let mock_b = MockSource::with_id("mock-b");
    mock_b.set_doi_article(
        "10.1/sparse",
        ArticleBuilder::new("9", "Sparse Record", "http://b/9", SourceType::CrossRef)
            .doi("10.1/sparse")
            .abstract_text("The missing abstract.")
            .build(),
    );

    let aggregator = mock_aggregator(vec![mock_a, mock_b], disabled_cache());
    let result = aggregator.search(&SearchQuery::new("q")).await;

    assert_eq!(result.articles.len(), 1);
    assert_eq!(result.articles[0].r#abstract, "The missing abstract.");
}

#[tokio::test]
async fn test_search_results_are_cached() {
    let temp = tempfile::TempDir::new().unwrap();
    let cache = Arc::new(CacheService::from_config(CacheConfig {
        enabled: true,
        directory: Some(temp.path().to_path_buf()),
        ..CacheConfig::default()
    }));
    cache.initialize().unwrap();

    let mock = MockSource::with_id("mock-a");
    mock.set_search_response(SearchResponse::new(
        vec![make_article("1", "Cached Result", SourceType::PubMed)],
        "mock-a",
        "q",
    ));

    let aggregator = mock_aggregator(vec![mock], Arc::clone(&cache));
    let query = SearchQuery::new("q");

    let first = aggregator.search(&query).await;
    assert_eq!(first.articles.len(), 1);

    // A second identical search is served from the cache, so a now-failing
    // source does not matter. The mock moved into the registry, so flip the
    // failure flag through a fresh aggregator sharing the same cache.
    let failing = MockSource::with_id("mock-a");
    failing.fail_searches(true);
    let second_aggregator = mock_aggregator(vec![failing], cache);

    let second = second_aggregator.search(&query).await;
    assert_eq!(second.articles.len(), 1);
    assert!(second.failed_sources.is_empty());
}

#[tokio::test]
async fn test_store_accumulates_enrichment_across_searches() {
    let store = ArticleStore::new();

    let id = store.upsert(
        ArticleBuilder::new("1", "Persistent", "http://a/1", SourceType::PubMed)
            .doi("10.1/p")
            .abstract_text("First pass abstract.")
            .build(),
    );
    store.set_summary(&id, "A summary.".to_string());

    // A later search returns the same DOI without an abstract
    store.upsert(
        ArticleBuilder::new("x9", "Persistent", "http://b/9", SourceType::CrossRef)
            .doi("10.1/P")
            .build(),
    );

    let record = store.get(&id).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(record.summary.as_deref(), Some("A summary."));
    assert_eq!(record.article.r#abstract, "First pass abstract.");
}

#[tokio::test]
async fn test_summarize_without_ai_falls_back_to_abstract_prefix() {
    let enricher = disabled_enricher();
    let long_abstract = "sentence ".repeat(60);
    let article = ArticleBuilder::new("1", "Fallback Article", "http://a/1", SourceType::PubMed)
        .abstract_text(&long_abstract)
        .build();

    let summary = enricher.summarize(&article).await;

    assert!(summary.starts_with("Fallback Article. "));
    assert!(summary.ends_with("..."));
}

#[tokio::test]
async fn test_batch_cycle_without_ai_leaves_articles_pending() {
    let store = Arc::new(ArticleStore::new());
    store.upsert(
        ArticleBuilder::new("1", "Pending", "http://a/1", SourceType::PubMed)
            .doi("10.1/pending")
            .abstract_text("An abstract.")
            .build(),
    );

    let config = BatchConfig {
        request_delay_ms: 0,
        ..BatchConfig::default()
    };
    let processed = BatchProcessor::run_cycle(&store, &disabled_enricher(), &config).await;

    assert_eq!(processed, 0);
    assert_eq!(store.missing_embedding(10).len(), 1);
}

#[tokio::test]
async fn test_similarity_ranking_over_stored_embeddings() {
    let store = ArticleStore::new();

    let close = store.upsert(
        ArticleBuilder::new("1", "Close", "http://a/1", SourceType::PubMed)
            .doi("10.1/close")
            .build(),
    );
    let far = store.upsert(
        ArticleBuilder::new("2", "Far", "http://a/2", SourceType::PubMed)
            .doi("10.1/far")
            .build(),
    );
    let target = store.upsert(
        ArticleBuilder::new("3", "Target", "http://a/3", SourceType::PubMed)
            .doi("10.1/target")
            .build(),
    );

    store.set_embedding(&close, vec![1.0, 0.1, 0.0]);
    store.set_embedding(&far, vec![0.0, 0.0, 1.0]);
    store.set_embedding(&target, vec![1.0, 0.0, 0.0]);

    let ranked = rank_similar(&[1.0, 0.0, 0.0], store.with_embedding(), 5, Some(target.as_str()));

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].article.id, close);
    assert!(ranked[0].score > ranked[1].score);
}

#[tokio::test]
async fn test_trend_report_from_stored_articles() {
    let store = ArticleStore::new();
    for (i, topic) in ["pharmacokinetics", "pharmacokinetics", "biosimilars"]
        .iter()
        .enumerate()
    {
        store.upsert(
            ArticleBuilder::new(
                i.to_string(),
                format!("Advances in {}", topic),
                format!("http://a/{}", i),
                SourceType::PubMed,
            )
            .doi(format!("10.1/t{}", i))
            .abstract_text(format!("A study of {} methods.", topic))
            .build(),
        );
    }

    let client = AiClient::new(&AiConfig::default(), None).unwrap();
    let analyzer = TrendAnalyzer::new(client, Arc::new(QuotaTracker::new(&QuotaConfig::default())));

    let recent = store.recent(30);
    let report = analyzer.analyze(&recent, 30).await;

    assert_eq!(report.article_count, 3);
    assert_eq!(
        report.frequent_topics.first().map(String::as_str),
        Some("pharmacokinetics")
    );
}
