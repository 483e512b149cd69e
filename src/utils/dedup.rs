//! Deduplication utilities for articles merged across sources.

use std::collections::{HashMap, HashSet};
use strsim::jaro_winkler;

use crate::models::Article;

/// Strategy for handling duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStrategy {
    /// Keep the first occurrence of each duplicate group
    First,
    /// Keep the last occurrence of each duplicate group
    Last,
}

/// Check if authors approximately match
fn authors_match(a: &Article, b: &Article) -> bool {
    let authors_a: HashSet<String> = a
        .author_list()
        .iter()
        .map(|s| s.to_lowercase().trim().to_string())
        .collect();
    let authors_b: HashSet<String> = b
        .author_list()
        .iter()
        .map(|s| s.to_lowercase().trim().to_string())
        .collect();

    // If one has no authors, can't compare
    if authors_a.is_empty() || authors_b.is_empty() {
        return true; // Assume match if author info is missing
    }

    // Check if at least one author matches
    authors_a.intersection(&authors_b).count() > 0
}

/// Normalize a title for comparison
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Calculate confidence that two articles are the same based on multiple signals
fn title_similarity_confidence(a: &Article, b: &Article) -> bool {
    let title_a = a.title.to_lowercase().trim().to_string();
    let title_b = b.title.to_lowercase().trim().to_string();
    let similarity = jaro_winkler(&title_a, &title_b);

    if similarity >= 0.95 && authors_match(a, b) {
        return true;
    }

    // Exact normalized title match with author overlap
    if normalize_title(&title_a) == normalize_title(&title_b) && authors_match(a, b) {
        return true;
    }

    false
}

/// Remove duplicate articles from a merged multi-source list.
///
/// Uses a two-pass algorithm for O(n) complexity on exact matches:
/// 1. Hash-based matching for lowercased DOIs and normalized titles
/// 2. Similarity check only for articles sharing a normalized title
///
/// Same-source pairs are never merged by title; two distinct records from one
/// source sharing a title are legitimately different (e.g. errata).
pub fn deduplicate_articles(articles: Vec<Article>, strategy: DuplicateStrategy) -> Vec<Article> {
    if articles.len() <= 1 {
        return articles;
    }

    let mut doi_map: HashMap<String, Vec<usize>> = HashMap::new();
    let mut title_map: HashMap<String, Vec<usize>> = HashMap::new();

    for (idx, article) in articles.iter().enumerate() {
        if let Some(ref doi) = article.doi {
            doi_map.entry(doi.to_lowercase()).or_default().push(idx);
        }

        let normalized = normalize_title(&article.title.to_lowercase());
        if !normalized.is_empty() {
            title_map.entry(normalized).or_default().push(idx);
        }
    }

    let mut duplicates: HashSet<usize> = HashSet::new();

    // DOI matches are the strongest signal
    for (_, indices) in doi_map.into_iter() {
        if indices.len() > 1 {
            match strategy {
                DuplicateStrategy::First => {
                    for idx in indices.iter().skip(1) {
                        duplicates.insert(*idx);
                    }
                }
                DuplicateStrategy::Last => {
                    for idx in indices.iter().take(indices.len() - 1) {
                        duplicates.insert(*idx);
                    }
                }
            }
        }
    }

    // Title matches for articles not already caught by DOI
    for (_, indices) in title_map.into_iter() {
        if indices.len() > 1 {
            let mut to_mark: Vec<usize> = Vec::new();

            for i in 0..indices.len() {
                if duplicates.contains(&indices[i]) {
                    continue;
                }

                for j in (i + 1)..indices.len() {
                    if duplicates.contains(&indices[j]) {
                        continue;
                    }

                    let article_i = &articles[indices[i]];
                    let article_j = &articles[indices[j]];

                    if article_i.source == article_j.source {
                        continue;
                    }

                    // Already handled by DOI matching
                    if let (Some(doi_i), Some(doi_j)) = (&article_i.doi, &article_j.doi) {
                        if doi_i.to_lowercase() == doi_j.to_lowercase() {
                            continue;
                        }
                    }

                    if title_similarity_confidence(article_i, article_j) {
                        match strategy {
                            DuplicateStrategy::First => to_mark.push(indices[j]),
                            DuplicateStrategy::Last => to_mark.push(indices[i]),
                        }
                    }
                }
            }

            for idx in to_mark {
                duplicates.insert(idx);
            }
        }
    }

    articles
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !duplicates.contains(i))
        .map(|(_, a)| a)
        .collect()
}
