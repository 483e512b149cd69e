//! Cosine similarity over article embeddings.

use crate::store::StoredArticle;

/// Cosine similarity between two vectors.
///
/// Zero-magnitude or dimension-mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// An article ranked by similarity to a target
#[derive(Debug, Clone)]
pub struct SimilarArticle {
    pub article: StoredArticle,
    pub score: f32,
}

/// Rank candidate articles by cosine similarity to a target embedding.
///
/// Candidates without embeddings and the excluded record are skipped.
/// The sort is stable so equal scores keep their input order.
pub fn rank_similar(
    target: &[f32],
    candidates: Vec<StoredArticle>,
    limit: usize,
    exclude_id: Option<&str>,
) -> Vec<SimilarArticle> {
    let mut ranked: Vec<SimilarArticle> = candidates
        .into_iter()
        .filter(|c| exclude_id != Some(c.id.as_str()))
        .filter_map(|c| {
            let score = c
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(target, e))?;
            Some(SimilarArticle { article: c, score })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleBuilder, SourceType};
    use crate::store::ArticleStore;

    fn stored(store: &ArticleStore, doi: &str, embedding: Option<Vec<f32>>) -> StoredArticle {
        let article =
            ArticleBuilder::new("1", "Test", format!("https://example.com/{}", doi), SourceType::PubMed)
                .doi(doi)
                .build();
        let id = store.upsert(article);
        if let Some(e) = embedding {
            store.set_embedding(&id, e);
        }
        store.get(&id).unwrap()
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_rank_similar() {
        let store = ArticleStore::new();
        let close = stored(&store, "10.1/close", Some(vec![1.0, 0.1]));
        let far = stored(&store, "10.1/far", Some(vec![0.0, 1.0]));
        let no_embedding = stored(&store, "10.1/none", None);

        let ranked = rank_similar(
            &[1.0, 0.0],
            vec![far.clone(), close.clone(), no_embedding],
            10,
            None,
        );

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].article.id, close.id);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_rank_similar_excludes_target() {
        let store = ArticleStore::new();
        let target = stored(&store, "10.1/target", Some(vec![1.0, 0.0]));
        let other = stored(&store, "10.1/other", Some(vec![0.9, 0.1]));

        let ranked = rank_similar(
            &[1.0, 0.0],
            vec![target.clone(), other],
            10,
            Some(&target.id),
        );

        assert_eq!(ranked.len(), 1);
        assert_ne!(ranked[0].article.id, target.id);
    }

    #[test]
    fn test_rank_similar_limit() {
        let store = ArticleStore::new();
        let candidates: Vec<_> = (0..5)
            .map(|i| stored(&store, &format!("10.1/{}", i), Some(vec![1.0, i as f32])))
            .collect();

        let ranked = rank_similar(&[1.0, 0.0], candidates, 2, None);
        assert_eq!(ranked.len(), 2);
    }
}
