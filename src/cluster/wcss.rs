//! Within-cluster sum of squares.
//!
//! ```text
//! WCSS = Σᵢ minⱼ ||xᵢ - μⱼ||²
//! ```
//!
//! Each item contributes its squared distance to the nearest centroid, so the
//! score is defined for any centroid set, not only the one that produced the
//! assignment. Lower is better.

use super::Centroid;
use crate::error::{ClusterError, Result};
use crate::vectors::{squared_distance, VectorSet};

/// Score a centroid set against every item.
pub fn score(items: &VectorSet, centroids: &[Centroid]) -> Result<f64> {
    if items.is_empty() {
        return Err(ClusterError::EmptyInput);
    }
    if centroids.is_empty() {
        return Err(ClusterError::InvalidClusterCount {
            requested: 0,
            n_items: items.len(),
        });
    }
    check_dimensions(items, centroids)?;

    Ok(items
        .vectors()
        .map(|v| {
            centroids
                .iter()
                .map(|c| squared_distance(v, c))
                .fold(f64::INFINITY, f64::min)
        })
        .sum())
}

pub(crate) fn check_dimensions(items: &VectorSet, centroids: &[Centroid]) -> Result<()> {
    for (index, c) in centroids.iter().enumerate() {
        if c.len() != items.dimension() {
            return Err(ClusterError::DimensionMismatch {
                index,
                id: format!("centroid {}", index),
                expected: items.dimension(),
                found: c.len(),
            });
        }
    }
    Ok(())
}
