//! Result assembly
//!
//! Turns a centroid set into per-cluster summaries: the items closest to each
//! centroid by cosine similarity plus an optional model-generated name.

pub mod checkpoint;

pub use checkpoint::*;

use crate::cluster::{top_matches, Centroid};
use crate::error::Result;
use crate::naming::{ClusterNamer, UNNAMED_CLUSTER};
use crate::vectors::VectorSet;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An item chosen to represent a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub id: String,
    pub text: String,
    pub similarity: f64,
    pub popularity: f32,
}

/// One cluster of the best model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub centroid: Centroid,
    pub representatives: Vec<Representative>,
    pub name: Option<String>,
}

impl ClusterSummary {
    pub fn texts(&self) -> Vec<String> {
        self.representatives.iter().map(|r| r.text.clone()).collect()
    }
}

/// Builds [`ClusterSummary`] sets for a centroid set.
#[derive(Clone)]
pub struct ResultAssembler {
    sample_size: usize,
    namer: Option<Arc<dyn ClusterNamer>>,
}

impl ResultAssembler {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            namer: None,
        }
    }

    pub fn with_namer(mut self, namer: Arc<dyn ClusterNamer>) -> Self {
        self.namer = Some(namer);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Rank representatives for every centroid, then name all clusters
    /// concurrently. Returns only once every naming call has finished or
    /// fallen back to [`UNNAMED_CLUSTER`].
    pub async fn assemble(
        &self,
        centroids: &[Centroid],
        items: &VectorSet,
    ) -> Result<Vec<ClusterSummary>> {
        let mut summaries = Vec::with_capacity(centroids.len());
        for centroid in centroids {
            let representatives = top_matches(centroid, items, self.sample_size)?
                .into_iter()
                .map(|m| Representative {
                    id: m.item.id.clone(),
                    text: m.item.text.clone(),
                    similarity: m.similarity,
                    popularity: m.item.popularity,
                })
                .collect();
            summaries.push(ClusterSummary {
                centroid: centroid.clone(),
                representatives,
                name: None,
            });
        }

        let Some(namer) = &self.namer else {
            return Ok(summaries);
        };

        let calls = summaries.iter().enumerate().map(|(index, summary)| {
            let namer = namer.clone();
            let texts = summary.texts();
            async move {
                match namer.name(&texts).await {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!("Naming cluster {} failed: {}", index, e);
                        UNNAMED_CLUSTER.to_string()
                    }
                }
            }
        });
        let names = join_all(calls).await;

        for (summary, name) in summaries.iter_mut().zip(names) {
            summary.name = Some(name);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{FnNamer, NamingError};
    use crate::vectors::Item;

    fn items() -> VectorSet {
        VectorSet::new(vec![
            Item::new("v1", vec![1.0, 0.0], "east"),
            Item::new("v2", vec![0.0, 1.0], "north"),
            Item::new("v3", vec![0.9, 0.1], "mostly east"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_assemble_without_namer() {
        let assembler = ResultAssembler::new(2);
        let summaries = assembler
            .assemble(&[vec![1.0, 0.0], vec![0.0, 1.0]], &items())
            .await
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].texts(), vec!["east", "mostly east"]);
        assert_eq!(summaries[1].representatives[0].id, "v2");
        assert!(summaries.iter().all(|s| s.name.is_none()));
    }

    #[tokio::test]
    async fn test_failing_namer_falls_back_to_placeholder() {
        let namer = FnNamer::new(|_: &[String]| Err(NamingError::Other("quota exceeded".into())));
        let assembler = ResultAssembler::new(25).with_namer(Arc::new(namer));
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];

        let summaries = assembler.assemble(&centroids, &items()).await.unwrap();

        assert_eq!(summaries.len(), 3);
        for summary in &summaries {
            assert_eq!(summary.name.as_deref(), Some(UNNAMED_CLUSTER));
            assert_eq!(summary.representatives.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_namer_receives_representative_texts() {
        let namer = FnNamer::new(|texts: &[String]| Ok(texts.join("+")));
        let assembler = ResultAssembler::new(1).with_namer(Arc::new(namer));
        let summaries = assembler.assemble(&[vec![0.0, 2.0]], &items()).await.unwrap();
        assert_eq!(summaries[0].name.as_deref(), Some("north"));
    }

    #[tokio::test]
    async fn test_zero_centroid_is_fatal() {
        let assembler = ResultAssembler::new(2);
        assert!(assembler.assemble(&[vec![0.0, 0.0]], &items()).await.is_err());
    }
}
