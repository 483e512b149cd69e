//! Topic trend analysis over recently stored articles.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AiClient, QuotaTracker, RequestKind};
use crate::models::TrendReport;
use crate::store::StoredArticle;

/// Valid range for the trend window, in days
pub const MIN_TREND_DAYS: i64 = 1;
pub const MAX_TREND_DAYS: i64 = 90;

/// Abstracts included in one trend prompt
const MAX_PROMPT_ARTICLES: usize = 30;

/// Characters of each abstract included in the prompt
const PROMPT_ABSTRACT_BUDGET: usize = 500;

/// Topics returned by the lexical fallback
const FALLBACK_TOPIC_COUNT: usize = 10;

const TRENDS_SYSTEM_PROMPT: &str = "You are a pharmaceutical research analyst. Given \
recent article titles and abstracts, identify topic trends. Respond with JSON only, \
using this shape: {\"frequent_topics\": [string], \"emerging_themes\": [string], \
\"notable_shifts\": [string]}";

/// Stopwords excluded from the lexical fallback
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "were", "was", "are", "have",
    "has", "been", "between", "among", "during", "after", "before", "study", "studies",
    "results", "patients", "effects", "effect", "analysis", "using", "based", "their",
    "these", "than", "into", "which", "other", "also", "more", "most", "can", "may",
    "not", "but", "all", "its", "our", "two", "one", "per", "both", "each", "group",
    "groups", "associated", "significant", "significantly", "conclusion", "conclusions",
    "background", "methods", "objective", "objectives",
];

/// Clamp a requested trend window to the supported range
pub fn clamp_trend_days(days: i64) -> i64 {
    days.clamp(MIN_TREND_DAYS, MAX_TREND_DAYS)
}

/// Analyzes topic trends across stored articles
pub struct TrendAnalyzer {
    client: AiClient,
    quotas: Arc<QuotaTracker>,
}

impl TrendAnalyzer {
    /// Create a new trend analyzer
    pub fn new(client: AiClient, quotas: Arc<QuotaTracker>) -> Self {
        Self { client, quotas }
    }

    /// Analyze trends across the given articles.
    ///
    /// Uses the chat model when AI is available; otherwise (or when the
    /// quota is exhausted or the answer unusable) falls back to lexical
    /// frequency ranking over titles and abstracts.
    pub async fn analyze(&self, articles: &[StoredArticle], days: i64) -> TrendReport {
        let days = clamp_trend_days(days);

        if articles.is_empty() {
            return TrendReport::empty(days as u32);
        }

        if self.client.is_enabled() && self.quotas.try_acquire(RequestKind::Completions).is_ok() {
            match self.analyze_with_ai(articles, days).await {
                Some(report) => return report,
                None => {
                    tracing::warn!("AI trend analysis failed, using lexical fallback");
                }
            }
        }

        self.lexical_fallback(articles, days)
    }

    async fn analyze_with_ai(&self, articles: &[StoredArticle], days: i64) -> Option<TrendReport> {
        let corpus: String = articles
            .iter()
            .take(MAX_PROMPT_ARTICLES)
            .map(|r| {
                let abstract_prefix: String = r
                    .article
                    .r#abstract
                    .chars()
                    .take(PROMPT_ABSTRACT_BUDGET)
                    .collect();
                format!("- {}: {}", r.article.title, abstract_prefix)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Articles from the last {} days:\n{}",
            days, corpus
        );

        let answer = match self
            .client
            .chat(TRENDS_SYSTEM_PROMPT, &user, Some(400), Some(0.0))
            .await
        {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!("Trend chat request failed: {}", e);
                return None;
            }
        };

        #[derive(Debug, Deserialize)]
        struct TrendAnswer {
            #[serde(default)]
            frequent_topics: Vec<String>,
            #[serde(default)]
            emerging_themes: Vec<String>,
            #[serde(default)]
            notable_shifts: Vec<String>,
        }

        let parsed: TrendAnswer =
            serde_json::from_str(super::enrich::strip_code_fences(&answer)).ok()?;

        Some(TrendReport {
            frequent_topics: parsed.frequent_topics,
            emerging_themes: parsed.emerging_themes,
            notable_shifts: parsed.notable_shifts,
            period_days: days as u32,
            article_count: articles.len(),
        })
    }

    /// Rank frequent non-stopword terms from titles and abstracts
    fn lexical_fallback(&self, articles: &[StoredArticle], days: i64) -> TrendReport {
        let mut counts: HashMap<String, usize> = HashMap::new();

        for record in articles {
            let text = format!("{} {}", record.article.title, record.article.r#abstract);
            for word in text.split_whitespace() {
                let cleaned: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();
                if cleaned.len() < 4 || STOPWORDS.contains(&cleaned.as_str()) {
                    continue;
                }
                *counts.entry(cleaned).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        TrendReport {
            frequent_topics: ranked
                .into_iter()
                .take(FALLBACK_TOPIC_COUNT)
                .map(|(word, _)| word)
                .collect(),
            emerging_themes: Vec::new(),
            notable_shifts: Vec::new(),
            period_days: days as u32,
            article_count: articles.len(),
        }
    }
}
