//! In-memory article store with DOI-keyed upserts.
//!
//! Merged search results are persisted here so that AI enrichment (summaries,
//! categories, embeddings) can accumulate across queries within a session.
//! Records are keyed by lowercased DOI when one exists, otherwise by the
//! source-specific article ID.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{Article, Categories};

/// A stored article together with its accumulated AI enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArticle {
    /// Stable store identifier, derived from the record key
    pub id: String,

    /// The bibliographic record
    pub article: Article,

    /// Embedding vector for similarity search
    pub embedding: Option<Vec<f32>>,

    /// AI-assigned therapeutic categories
    pub categories: Option<Categories>,

    /// AI-generated summary
    pub summary: Option<String>,

    /// When the record was first stored
    pub created_at: DateTime<Utc>,

    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe in-memory article store
#[derive(Debug, Default)]
pub struct ArticleStore {
    records: RwLock<HashMap<String, StoredArticle>>,
}

impl ArticleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for a record: lowercased DOI when present, else the article ID
    fn record_key(article: &Article) -> String {
        article
            .doi
            .as_deref()
            .map(|d| d.to_lowercase())
            .unwrap_or_else(|| article.article_id.clone())
    }

    /// Stable identifier derived from the record key
    fn derive_id(key: &str) -> String {
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// Insert or update an article, returning the store ID.
    ///
    /// Updating replaces the bibliographic fields and keeps the original
    /// creation timestamp. Enrichment survives only while the title and
    /// abstract are unchanged; when the text differs the embedding, summary
    /// and categories are cleared so the batch processor re-enriches.
    pub fn upsert(&self, article: Article) -> String {
        let key = Self::record_key(&article);
        let id = Self::derive_id(&key);
        let now = Utc::now();

        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match records.get_mut(&key) {
            Some(existing) => {
                // Don't clobber an abstract with an empty one
                let merged_abstract =
                    if existing.article.has_abstract() && !article.has_abstract() {
                        existing.article.r#abstract.clone()
                    } else {
                        article.r#abstract.clone()
                    };
                let text_changed = existing.article.title != article.title
                    || existing.article.r#abstract != merged_abstract;

                existing.article = article;
                existing.article.r#abstract = merged_abstract;

                // Stale enrichment describes text that no longer exists
                if text_changed {
                    existing.embedding = None;
                    existing.summary = None;
                    existing.categories = None;
                }
                existing.updated_at = now;
            }
            None => {
                records.insert(
                    key,
                    StoredArticle {
                        id: id.clone(),
                        article,
                        embedding: None,
                        categories: None,
                        summary: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }

        id
    }

    /// Insert or update a batch of articles
    pub fn upsert_all(&self, articles: Vec<Article>) -> Vec<String> {
        articles.into_iter().map(|a| self.upsert(a)).collect()
    }

    /// Get a record by store ID
    pub fn get(&self, id: &str) -> Option<StoredArticle> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.values().find(|r| r.id == id).cloned()
    }

    /// Get a record by DOI
    pub fn get_by_doi(&self, doi: &str) -> Option<StoredArticle> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.get(&doi.to_lowercase()).cloned()
    }

    /// All records stored within the last `days` days
    pub fn recent(&self, days: i64) -> Vec<StoredArticle> {
        let cutoff = Utc::now() - Duration::days(days);
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut recent: Vec<StoredArticle> = records
            .values()
            .filter(|r| r.created_at >= cutoff)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent
    }

    /// Up to `limit` records that have no embedding yet
    pub fn missing_embedding(&self, limit: usize) -> Vec<StoredArticle> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut missing: Vec<StoredArticle> = records
            .values()
            .filter(|r| r.embedding.is_none())
            .cloned()
            .collect();
        missing.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        missing.truncate(limit);
        missing
    }

    /// All records that carry an embedding
    pub fn with_embedding(&self) -> Vec<StoredArticle> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records
            .values()
            .filter(|r| r.embedding.is_some())
            .cloned()
            .collect()
    }

    /// Attach an embedding to a record
    pub fn set_embedding(&self, id: &str, embedding: Vec<f32>) -> bool {
        self.update_record(id, |r| r.embedding = Some(embedding))
    }

    /// Attach categories to a record
    pub fn set_categories(&self, id: &str, categories: Categories) -> bool {
        self.update_record(id, |r| r.categories = Some(categories))
    }

    /// Attach a summary to a record
    pub fn set_summary(&self, id: &str, summary: String) -> bool {
        self.update_record(id, |r| r.summary = Some(summary))
    }

    fn update_record<F: FnOnce(&mut StoredArticle)>(&self, id: &str, f: F) -> bool {
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match records.values_mut().find(|r| r.id == id) {
            Some(record) => {
                f(record);
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
