//! AI enrichment models: categorization and trend analysis results.

use serde::{Deserialize, Serialize};

/// Research-area categorization of a single article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    /// Primary research area (e.g. "oncology", "pharmacokinetics")
    pub primary_area: String,

    /// Secondary research areas
    #[serde(default)]
    pub secondary_areas: Vec<String>,

    /// Keywords extracted from the article
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Topic-trend analysis over a window of recent articles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    /// Topics that appear most often in the window
    #[serde(default)]
    pub frequent_topics: Vec<String>,

    /// Themes that appear to be gaining ground
    #[serde(default)]
    pub emerging_themes: Vec<String>,

    /// Notable shifts in focus compared to earlier work
    #[serde(default)]
    pub notable_shifts: Vec<String>,

    /// Window size in days
    pub period_days: u32,

    /// Number of articles analyzed
    pub article_count: usize,
}

impl TrendReport {
    /// Create an empty report for a window with no articles
    pub fn empty(period_days: u32) -> Self {
        Self {
            frequent_topics: Vec::new(),
            emerging_themes: Vec::new(),
            notable_shifts: Vec::new(),
            period_days,
            article_count: 0,
        }
    }
}
