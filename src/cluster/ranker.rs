//! Cosine-similarity ranking of items against a centroid.

use crate::error::{ClusterError, Result};
use crate::vectors::{norm, Item, VectorSet};
use std::cmp::Ordering;

/// An item matched to a centroid.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    /// Position of the item in input order
    pub index: usize,
    pub similarity: f64,
    pub item: &'a Item,
}

/// Cosine similarity. Zero-norm vectors are an error, never coerced to 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 {
        return Err(ClusterError::DegenerateVector {
            subject: "first vector".to_string(),
        });
    }
    if nb == 0.0 {
        return Err(ClusterError::DegenerateVector {
            subject: "second vector".to_string(),
        });
    }
    Ok(dot(a, b) / (na * nb))
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

/// Top `n` items by descending cosine similarity to `centroid`.
///
/// Equal similarities keep input order. Returns fewer than `n` matches when
/// the set is smaller.
pub fn top_matches<'a>(centroid: &[f32], items: &'a VectorSet, n: usize) -> Result<Vec<Match<'a>>> {
    if centroid.len() != items.dimension() && !items.is_empty() {
        return Err(ClusterError::DimensionMismatch {
            index: 0,
            id: "centroid".to_string(),
            expected: items.dimension(),
            found: centroid.len(),
        });
    }

    let centroid_norm = norm(centroid);
    if centroid_norm == 0.0 {
        return Err(ClusterError::DegenerateVector {
            subject: "centroid".to_string(),
        });
    }

    let mut scored = Vec::with_capacity(items.len());
    for (index, item) in items.items().iter().enumerate() {
        let item_norm = items.norm(index);
        if item_norm == 0.0 {
            return Err(ClusterError::DegenerateVector {
                subject: format!("item {} ({})", index, item.id),
            });
        }
        scored.push(Match {
            index,
            similarity: dot(centroid, &item.vector) / (centroid_norm * item_norm),
            item,
        });
    }

    // sort_by is stable
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(n);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(points: &[(&str, Vec<f32>)]) -> VectorSet {
        VectorSet::new(
            points
                .iter()
                .map(|(id, v)| Item::new(*id, v.clone(), *id))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_sim() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap().abs() < 1e-12);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_top_matches_order() {
        let items = set(&[
            ("v1", vec![1.0, 0.0]),
            ("v2", vec![0.0, 1.0]),
            ("v3", vec![0.9, 0.1]),
        ]);
        let matches = top_matches(&[1.0, 0.0], &items, 2).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.item.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v3"]);
        assert_eq!(matches[1].index, 2);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let items = set(&[
            ("a", vec![0.0, 1.0]),
            ("b", vec![2.0, 0.0]),
            ("c", vec![1.0, 0.0]),
            ("d", vec![3.0, 0.0]),
        ]);
        let matches = top_matches(&[1.0, 0.0], &items, 10).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.item.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_fewer_items_than_requested() {
        let items = set(&[("a", vec![1.0, 1.0])]);
        assert_eq!(top_matches(&[1.0, 0.0], &items, 25).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_norm_is_fatal() {
        let items = set(&[("a", vec![1.0, 1.0]), ("zero", vec![0.0, 0.0])]);
        assert!(matches!(
            top_matches(&[0.0, 0.0], &items, 1),
            Err(ClusterError::DegenerateVector { .. })
        ));
        match top_matches(&[1.0, 0.0], &items, 1) {
            Err(ClusterError::DegenerateVector { subject }) => assert!(subject.contains("zero")),
            other => panic!("expected degenerate vector error, got {:?}", other),
        }
    }
}
