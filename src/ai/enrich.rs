//! Article-level AI enrichment: summaries, categorization and embeddings.

use std::sync::Arc;

use super::{AiClient, AiError, QuotaTracker, RequestKind};
use crate::models::{Article, Categories};
use crate::utils::{AiCacheKind, CacheResult, CacheService};

/// Abstract budget for categorization prompts, in characters
const CATEGORIZE_INPUT_BUDGET: usize = 1000;

/// Abstract budget for summary prompts, in characters
const SUMMARIZE_INPUT_BUDGET: usize = 1500;

/// Length of the abstract prefix used as a summary fallback
const SUMMARY_FALLBACK_LEN: usize = 200;

const SUMMARIZE_SYSTEM_PROMPT: &str = "You are a pharmaceutical research assistant. \
Summarize scientific abstracts for practicing pharmacists in at most 4 sentences, \
keeping drug names, dosages and clinical outcomes.";

const CATEGORIZE_SYSTEM_PROMPT: &str = "You are a pharmaceutical research assistant. \
Classify articles into therapeutic areas. Respond with JSON only, no prose, using \
this shape: {\"primary_area\": string, \"secondary_areas\": [string], \
\"keywords\": [string]}";

/// Runs per-article AI enrichment with caching, quota budgets and fallbacks
pub struct Enricher {
    client: AiClient,
    cache: Arc<CacheService>,
    quotas: Arc<QuotaTracker>,
}

impl Enricher {
    /// Create a new enricher
    pub fn new(client: AiClient, cache: Arc<CacheService>, quotas: Arc<QuotaTracker>) -> Self {
        Self {
            client,
            cache,
            quotas,
        }
    }

    /// Whether the underlying AI client will make real calls
    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    fn truncate_chars(text: &str, budget: usize) -> String {
        text.chars().take(budget).collect()
    }

    /// Deterministic summary used when AI is unavailable: title plus
    /// abstract prefix.
    fn fallback_summary(article: &Article) -> String {
        let prefix = Self::truncate_chars(&article.r#abstract, SUMMARY_FALLBACK_LEN);
        if prefix.is_empty() {
            article.title.clone()
        } else if article.r#abstract.chars().count() > SUMMARY_FALLBACK_LEN {
            format!("{}. {}...", article.title, prefix)
        } else {
            format!("{}. {}", article.title, prefix)
        }
    }

    /// Summarize an article's abstract in at most 4 sentences.
    ///
    /// Results are cached by input text. On any AI failure (disabled, quota,
    /// network) the abstract prefix is returned instead.
    pub async fn summarize(&self, article: &Article) -> String {
        if !article.has_abstract() {
            return Self::fallback_summary(article);
        }

        let input = Self::truncate_chars(&article.r#abstract, SUMMARIZE_INPUT_BUDGET);

        if let CacheResult::Hit(cached) = self.cache.get_ai::<String>(AiCacheKind::Summary, &input)
        {
            return cached;
        }

        if let Err(e) = self.quotas.try_acquire(RequestKind::Completions) {
            tracing::debug!("Summary falling back to abstract prefix: {}", e);
            return Self::fallback_summary(article);
        }

        let user = format!("Title: {}\n\nAbstract: {}", article.title, input);
        match self
            .client
            .chat(SUMMARIZE_SYSTEM_PROMPT, &user, Some(300), Some(0.0))
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => {
                let summary = summary.trim().to_string();
                self.cache.set_ai(AiCacheKind::Summary, &input, &summary);
                summary
            }
            Ok(_) => Self::fallback_summary(article),
            Err(e) => {
                tracing::warn!("Summary generation failed, using fallback: {}", e);
                Self::fallback_summary(article)
            }
        }
    }

    /// Categorize an article into therapeutic areas.
    ///
    /// Returns `None` when AI is disabled or the quota is exhausted; a
    /// malformed JSON answer is an error for the caller to log and skip.
    pub async fn categorize(&self, article: &Article) -> Result<Option<Categories>, AiError> {
        if !self.client.is_enabled() {
            return Ok(None);
        }

        let input = format!(
            "{} {}",
            article.title,
            Self::truncate_chars(&article.r#abstract, CATEGORIZE_INPUT_BUDGET)
        );

        if let CacheResult::Hit(cached) = self
            .cache
            .get_ai::<Categories>(AiCacheKind::Categories, &input)
        {
            return Ok(Some(cached));
        }

        if self.quotas.try_acquire(RequestKind::Completions).is_err() {
            return Ok(None);
        }

        let answer = self
            .client
            .chat(CATEGORIZE_SYSTEM_PROMPT, &input, Some(200), Some(0.0))
            .await?;

        let categories: Categories = serde_json::from_str(strip_code_fences(&answer))
            .map_err(|e| AiError::Parse(format!("categorization JSON: {}", e)))?;

        self.cache
            .set_ai(AiCacheKind::Categories, &input, &categories);
        Ok(Some(categories))
    }

    /// Get an embedding for an article, cached by input text.
    ///
    /// Returns `None` for articles with no usable text, when AI is disabled,
    /// or when the embedding quota is exhausted.
    pub async fn embed_article(&self, article: &Article) -> Result<Option<Vec<f32>>, AiError> {
        let input = format!(
            "{} {}",
            article.title,
            Self::truncate_chars(&article.r#abstract, CATEGORIZE_INPUT_BUDGET)
        );
        if input.trim().is_empty() {
            return Ok(None);
        }
        if !self.client.is_enabled() {
            return Ok(None);
        }

        if let CacheResult::Hit(cached) = self
            .cache
            .get_ai::<Vec<f32>>(AiCacheKind::Embedding, &input)
        {
            return Ok(Some(cached));
        }

        if self.quotas.try_acquire(RequestKind::Embeddings).is_err() {
            return Ok(None);
        }

        match self.client.embed(&input).await? {
            Some(embedding) => {
                self.cache.set_ai(AiCacheKind::Embedding, &input, &embedding);
                Ok(Some(embedding))
            }
            None => Ok(None),
        }
    }
}

/// Strip Markdown code fences that chat models like to wrap JSON in
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
