//! K-means clustering (Lloyd's algorithm) with deterministic seeding.
//!
//! 1. **Seed**: the first k item vectors in input order, or caller-supplied centroids
//! 2. **Assign**: each item → nearest centroid (lowest index wins ties)
//! 3. **Update**: each centroid → coordinate-wise mean of its items
//! 4. Stop when the update is a no-op, when relative centroid movement drops
//!    below the threshold, or when the iteration cap is hit
//!
//! There is no randomness anywhere: identical input order, k and iteration cap
//! give bit-identical centroids. An empty cluster keeps its previous centroid,
//! so a run always returns exactly k centroids.

use super::{wcss, CandidateEvaluator, Centroid, ClusteringResult, Termination};
use crate::error::{ClusterError, Result};
use crate::vectors::{norm, squared_distance, VectorSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default relative movement threshold (0.01%).
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.0001;

/// Default iteration cap per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// K-means engine configuration.
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Maximum assignment/update cycles.
    max_iterations: usize,
    /// Relative movement threshold, as a fraction.
    threshold: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl KMeans {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            threshold: DEFAULT_CONVERGENCE_THRESHOLD,
        }
    }

    /// Set the relative convergence threshold (fraction, e.g. `0.0001` for 0.01%).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Cluster `items` into exactly `k` groups.
    ///
    /// Without `initial` centroids the run is seeded with the first `k` item
    /// vectors. Reaching the iteration cap is a soft stop and still returns the
    /// last computed centroids.
    pub fn run(
        &self,
        items: &VectorSet,
        k: usize,
        initial: Option<Vec<Centroid>>,
    ) -> Result<ClusteringResult> {
        if items.is_empty() {
            return Err(ClusterError::EmptyInput);
        }
        if k == 0 || k > items.len() {
            return Err(ClusterError::InvalidClusterCount {
                requested: k,
                n_items: items.len(),
            });
        }

        let mut centroids = match initial {
            Some(seed) => {
                if seed.len() != k {
                    return Err(ClusterError::InvalidParameter {
                        name: "initial_centroids",
                        message: format!("expected {} centroids, got {}", k, seed.len()),
                    });
                }
                wcss::check_dimensions(items, &seed)?;
                seed
            }
            None => items.vectors().take(k).map(|v| v.to_vec()).collect(),
        };

        tracing::debug!("Clustering {} vectors with k={}", items.len(), k);

        let mut iterations = 0;
        let mut termination = Termination::IterationCap;

        while iterations < self.max_iterations {
            iterations += 1;

            let labels = assign(items, &centroids);
            let updated = update(items, &labels, &centroids);

            if updated == centroids {
                termination = Termination::Stable;
                break;
            }

            let shift = relative_shift(&centroids, &updated);
            tracing::debug!(
                "k={} iteration #{} relative centroid shift: {:.6}%",
                k,
                iterations,
                shift * 100.0
            );

            if shift < self.threshold {
                // The previous set is kept as the converged answer
                termination = Termination::Converged {
                    relative_shift: shift,
                };
                break;
            }
            centroids = updated;
        }

        let wcss = wcss::score(items, &centroids)?;

        match termination {
            Termination::IterationCap => tracing::debug!(
                "k={} stopped at iteration cap ({} iterations) without converging",
                k,
                iterations
            ),
            _ => tracing::debug!("k={} {} after {} iterations", k, termination, iterations),
        }

        Ok(ClusteringResult {
            k,
            centroids,
            wcss,
            iterations,
            termination,
        })
    }
}

impl CandidateEvaluator for KMeans {
    fn evaluate(&self, items: &VectorSet, k: usize) -> Result<ClusteringResult> {
        self.run(items, k, None)
    }
}

/// Index of the nearest centroid; the first minimum wins.
fn nearest(point: &[f32], centroids: &[Centroid]) -> usize {
    let mut best_cluster = 0;
    let mut best_dist = f64::INFINITY;
    for (j, c) in centroids.iter().enumerate() {
        let dist = squared_distance(point, c);
        if dist < best_dist {
            best_dist = dist;
            best_cluster = j;
        }
    }
    best_cluster
}

/// Assignment step: nearest centroid per item.
#[cfg(feature = "parallel")]
pub fn assign(items: &VectorSet, centroids: &[Centroid]) -> Vec<usize> {
    items
        .items()
        .par_iter()
        .map(|item| nearest(&item.vector, centroids))
        .collect()
}

/// Assignment step: nearest centroid per item.
#[cfg(not(feature = "parallel"))]
pub fn assign(items: &VectorSet, centroids: &[Centroid]) -> Vec<usize> {
    items.vectors().map(|v| nearest(v, centroids)).collect()
}

/// Update step: mean of assigned vectors, previous centroid for empty clusters.
fn update(items: &VectorSet, labels: &[usize], previous: &[Centroid]) -> Vec<Centroid> {
    let k = previous.len();
    let d = items.dimension();
    let mut sums = vec![vec![0.0f64; d]; k];
    let mut counts = vec![0usize; k];

    for (v, &label) in items.vectors().zip(labels) {
        for (acc, &x) in sums[label].iter_mut().zip(v) {
            *acc += x as f64;
        }
        counts[label] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| (s / count as f64) as f32).collect()
            }
        })
        .collect()
}

/// Mean distance between corresponding old/new centroids divided by the mean
/// norm of the old centroids.
pub fn relative_shift(old: &[Centroid], new: &[Centroid]) -> f64 {
    let n = old.len() as f64;
    let mean_shift = old
        .iter()
        .zip(new)
        .map(|(a, b)| squared_distance(a, b).sqrt())
        .sum::<f64>()
        / n;
    let mean_norm = old.iter().map(|c| norm(c)).sum::<f64>() / n;

    if mean_norm > 0.0 {
        mean_shift / mean_norm
    } else if mean_shift == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}
