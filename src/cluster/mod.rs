//! Clustering engine
//!
//! - [`kmeans`] - deterministic Lloyd iterations for a fixed k
//! - [`wcss`] - within-cluster sum of squares scoring
//! - [`elbow`] - search over increasing k with checkpointing on improvement
//! - [`ranker`] - cosine-similarity retrieval of representative items

pub mod elbow;
pub mod kmeans;
pub mod ranker;
pub mod wcss;

pub use elbow::*;
pub use kmeans::*;
pub use ranker::*;
pub use wcss::*;

use crate::error::Result;
use crate::vectors::{Embedding, VectorSet};
use serde::{Deserialize, Serialize};

/// A cluster center. Same dimensionality as the item vectors.
pub type Centroid = Embedding;

/// Why a K-means run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The update produced exactly the same centroids.
    Stable,
    /// Mean centroid movement relative to mean centroid norm fell below the threshold.
    Converged { relative_shift: f64 },
    /// The iteration cap was reached first. Not an error.
    IterationCap,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Converged { relative_shift } => {
                write!(f, "converged ({:.4}% shift)", relative_shift * 100.0)
            }
            Self::IterationCap => write!(f, "iteration cap"),
        }
    }
}

/// Outcome of one K-means run for a fixed k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub k: usize,
    pub centroids: Vec<Centroid>,
    pub wcss: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Produces a scored clustering for a candidate k.
///
/// Implemented by [`KMeans`]; the elbow search only depends on this trait.
pub trait CandidateEvaluator {
    fn evaluate(&self, items: &VectorSet, k: usize) -> Result<ClusteringResult>;
}
