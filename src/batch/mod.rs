//! Background batch enrichment of stored articles.
//!
//! A periodic task that embeds stored articles which have no embedding yet,
//! and opportunistically categorizes them while completion quota remains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::ai::Enricher;
use crate::config::BatchConfig;
use crate::store::ArticleStore;

/// Periodic enrichment worker
pub struct BatchProcessor {
    store: Arc<ArticleStore>,
    enricher: Arc<Enricher>,
    config: BatchConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl BatchProcessor {
    /// Create a new batch processor
    pub fn new(store: Arc<ArticleStore>, enricher: Arc<Enricher>, config: BatchConfig) -> Self {
        Self {
            store,
            enricher,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the processing loop is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the processing loop. Calling start on a running processor is
    /// a no-op with a warning.
    pub fn start(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Batch processor is already running");
            return None;
        }

        self.shutdown.store(false, Ordering::SeqCst);

        let store = Arc::clone(&self.store);
        let enricher = Arc::clone(&self.enricher);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);

        tracing::info!(
            "Starting batch processor (batch size {}, every {}s)",
            config.batch_size,
            config.interval_seconds
        );

        Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(config.interval_seconds.max(1)));

            loop {
                ticker.tick().await;

                if shutdown.load(Ordering::SeqCst) {
                    break;
                }

                Self::run_cycle(&store, &enricher, &config).await;
            }

            running.store(false, Ordering::SeqCst);
            tracing::info!("Batch processor stopped");
        }))
    }

    /// Request the loop to stop after the current cycle
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Process one batch of articles missing embeddings
    pub async fn run_cycle(store: &ArticleStore, enricher: &Enricher, config: &BatchConfig) -> usize {
        let pending = store.missing_embedding(config.batch_size);
        if pending.is_empty() {
            tracing::debug!("No articles pending enrichment");
            return 0;
        }

        tracing::info!("Enriching {} articles", pending.len());
        let mut processed = 0;

        for record in pending {
            match enricher.embed_article(&record.article).await {
                Ok(Some(embedding)) => {
                    store.set_embedding(&record.id, embedding);
                    processed += 1;
                }
                Ok(None) => {
                    // No quota left or nothing to embed; try again next cycle
                    tracing::debug!("Skipping embedding for {}", record.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Embedding failed for {}: {}", record.id, e);
                    continue;
                }
            }

            if record.categories.is_none() {
                match enricher.categorize(&record.article).await {
                    Ok(Some(categories)) => {
                        store.set_categories(&record.id, categories);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Categorization failed for {}: {}", record.id, e);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(config.request_delay_ms)).await;
        }

        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiClient, QuotaTracker};
    use crate::config::{AiConfig, CacheConfig, QuotaConfig};
    use crate::models::{ArticleBuilder, SourceType};
    use crate::utils::CacheService;

    fn disabled_enricher() -> Arc<Enricher> {
        let client = AiClient::new(&AiConfig::default(), None).unwrap();
        let cache = CacheService::from_config(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        Arc::new(Enricher::new(
            client,
            Arc::new(cache),
            Arc::new(QuotaTracker::new(&QuotaConfig::default())),
        ))
    }

    #[tokio::test]
    async fn test_cycle_with_disabled_ai_processes_nothing() {
        let store = Arc::new(ArticleStore::new());
        store.upsert(
            ArticleBuilder::new("1", "Test", "https://example.com/1", SourceType::PubMed)
                .doi("10.1/a")
                .abstract_text("An abstract.")
                .build(),
        );

        let config = BatchConfig {
            request_delay_ms: 0,
            ..BatchConfig::default()
        };
        let processed = BatchProcessor::run_cycle(&store, &disabled_enricher(), &config).await;

        // Disabled AI yields no embeddings; the article stays pending
        assert_eq!(processed, 0);
        assert_eq!(store.missing_embedding(10).len(), 1);
    }

    #[tokio::test]
    async fn test_double_start_is_noop() {
        let store = Arc::new(ArticleStore::new());
        let processor = BatchProcessor::new(
            store,
            disabled_enricher(),
            BatchConfig {
                interval_seconds: 3600,
                ..BatchConfig::default()
            },
        );

        let first = processor.start();
        assert!(first.is_some());
        assert!(processor.is_running());

        let second = processor.start();
        assert!(second.is_none());

        processor.stop();
        if let Some(handle) = first {
            handle.abort();
        }
    }
}
