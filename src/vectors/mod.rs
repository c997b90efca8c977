//! Vector set
//!
//! In-memory collection of embedded items. Input order is preserved exactly as
//! loaded because the K-means engine seeds from the first k vectors.

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An embedding vector. Dimensionality is fixed for a whole run.
pub type Embedding = Vec<f32>;

/// One input record: identifier, embedding, display text and popularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub vector: Embedding,
    pub text: String,
    /// Engagement score in [0.1, 1.0]
    pub popularity: f32,
}

impl Item {
    pub fn new(id: impl Into<String>, vector: Embedding, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            text: text.into(),
            popularity: popularity_score(0, 0),
        }
    }

    pub fn with_popularity(mut self, popularity: f32) -> Self {
        self.popularity = popularity;
        self
    }
}

/// Map engagement counters to a score: `clamp(favorites + retweets, 1, 10) / 10`.
pub fn popularity_score(favorites: u64, retweets: u64) -> f32 {
    favorites.saturating_add(retweets).clamp(1, 10) as f32 / 10.0
}

/// Validated, immutable collection of items with cached vector norms.
#[derive(Debug, Clone, Default)]
pub struct VectorSet {
    items: Vec<Item>,
    dimension: usize,
    norms: Vec<f64>,
}

impl VectorSet {
    /// Build a vector set, failing on the first record whose vector has a
    /// different length than the first one or contains NaN/infinity.
    /// Zero-length vectors are rejected; an empty set is not.
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let dimension = items.first().map(|i| i.vector.len()).unwrap_or(0);
        if let Some(first) = items.first() {
            if dimension == 0 {
                return Err(ClusterError::EmptyVector {
                    index: 0,
                    id: first.id.clone(),
                });
            }
        }
        let mut norms = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if item.vector.len() != dimension {
                return Err(ClusterError::DimensionMismatch {
                    index,
                    id: item.id.clone(),
                    expected: dimension,
                    found: item.vector.len(),
                });
            }
            if item.vector.iter().any(|x| !x.is_finite()) {
                return Err(ClusterError::NonFiniteValue {
                    index,
                    id: item.id.clone(),
                });
            }
            norms.push(norm(&item.vector));
        }

        Ok(Self {
            items,
            dimension,
            norms,
        })
    }

    /// Convert raw input records, keeping their order.
    pub fn from_records(records: Vec<InputRecord>) -> Result<Self> {
        let items = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_item(index))
            .collect::<Result<Vec<_>>>()?;
        Self::new(items)
    }

    /// Load a JSON array of records from disk.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<InputRecord> = serde_json::from_str(&content)?;
        let set = Self::from_records(records)?;
        tracing::info!(
            "Loaded {} vectors of dimension {} from {:?}",
            set.len(),
            set.dimension(),
            path.as_ref()
        );
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Vector length shared by every item (0 for an empty set).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, index: usize) -> &Item {
        &self.items[index]
    }

    pub fn vector(&self, index: usize) -> &[f32] {
        &self.items[index].vector
    }

    /// Cached Euclidean norm of the vector at `index`.
    pub fn norm(&self, index: usize) -> f64 {
        self.norms[index]
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.items.iter().map(|i| i.vector.as_slice())
    }
}

/// Euclidean norm, accumulated in f64.
pub fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// Squared Euclidean distance, accumulated in f64.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}

/// Record as stored in the embeddings file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputRecord {
    #[serde(alias = "item")]
    pub tweet: Option<RecordFields>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordFields {
    #[serde(alias = "id")]
    pub id_str: Option<String>,
    #[serde(alias = "text")]
    pub full_text: Option<String>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
}

impl InputRecord {
    fn into_item(self, index: usize) -> Result<Item> {
        let fields = self
            .tweet
            .ok_or(ClusterError::MissingField { index, field: "tweet" })?;
        let id = fields
            .id_str
            .ok_or(ClusterError::MissingField { index, field: "id_str" })?;
        let text = fields
            .full_text
            .ok_or(ClusterError::MissingField { index, field: "full_text" })?;
        let vector = self
            .embedding
            .ok_or(ClusterError::MissingField { index, field: "embedding" })?;

        Ok(Item {
            id,
            vector,
            text,
            popularity: popularity_score(fields.favorite_count, fields.retweet_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popularity_clamped() {
        assert_eq!(popularity_score(0, 0), 0.1);
        assert_eq!(popularity_score(3, 2), 0.5);
        assert_eq!(popularity_score(400, 12), 1.0);
    }

    #[test]
    fn test_dimension_mismatch_names_record() {
        let items = vec![
            Item::new("a", vec![1.0, 0.0], "first"),
            Item::new("b", vec![0.0, 1.0], "second"),
            Item::new("c", vec![1.0], "third"),
        ];
        match VectorSet::new(items) {
            Err(ClusterError::DimensionMismatch {
                index,
                id,
                expected,
                found,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(id, "c");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_length_vectors() {
        let items = vec![Item::new("a", vec![], "x"), Item::new("b", vec![], "y")];
        match VectorSet::new(items) {
            Err(ClusterError::EmptyVector { index, id }) => {
                assert_eq!(index, 0);
                assert_eq!(id, "a");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_nan() {
        let items = vec![Item::new("a", vec![f32::NAN, 0.0], "x")];
        assert!(matches!(
            VectorSet::new(items),
            Err(ClusterError::NonFiniteValue { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_json_records() {
        let json = r#"[
            {"tweet": {"id_str": "1", "full_text": "hello", "favorite_count": 4, "retweet_count": 1}, "embedding": [3.0, 4.0]},
            {"tweet": {"id_str": "2", "full_text": "world"}, "embedding": [0.0, 1.0]}
        ]"#;
        let records: Vec<InputRecord> = serde_json::from_str(json).unwrap();
        let set = VectorSet::from_records(records).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.dimension(), 2);
        assert_eq!(set.item(0).text, "hello");
        assert_eq!(set.item(0).popularity, 0.5);
        assert!((set.norm(0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_embedding_fails_whole_load() {
        let json = r#"[
            {"tweet": {"id_str": "1", "full_text": "ok"}, "embedding": [1.0]},
            {"tweet": {"id_str": "2", "full_text": "no vector"}}
        ]"#;
        let records: Vec<InputRecord> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            VectorSet::from_records(records),
            Err(ClusterError::MissingField {
                index: 1,
                field: "embedding"
            })
        ));
    }

    #[test]
    fn test_empty_set_is_constructible() {
        let set = VectorSet::new(Vec::new()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.dimension(), 0);
    }
}
