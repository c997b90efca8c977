//! Elbow search over the number of clusters.
//!
//! Candidates are evaluated at `min_k, min_k + step, …, max_k`. The lowest
//! WCSS seen so far is the best model; the search stops at the first candidate
//! whose WCSS is not strictly lower than the best.
//!
//! This is an approximation of elbow detection, not a curvature analysis:
//! WCSS is normally non-increasing in k, so the first increase is taken as the
//! elbow. On every new best the checkpoint sink is awaited before the next k is
//! tried, so an interrupted search still leaves the best result on disk.

use super::{CandidateEvaluator, ClusteringResult};
use crate::error::{ClusterError, Result};
use crate::vectors::VectorSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Candidate k range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub min_k: usize,
    pub max_k: usize,
    pub step: usize,
}

impl SearchParams {
    pub fn new(min_k: usize, max_k: usize, step: usize) -> Self {
        Self { min_k, max_k, step }
    }

    /// Bound `max_k` by ⌊√n⌋ to limit search cost.
    pub fn clamp_to_sqrt(mut self, n_items: usize) -> Self {
        let root = (n_items as f64).sqrt().floor() as usize;
        self.max_k = self.max_k.min(root);
        self
    }

    /// Candidate values in evaluation order.
    pub fn candidates(&self) -> impl Iterator<Item = usize> {
        let max_k = self.max_k;
        (self.min_k..=max_k).step_by(self.step.max(1))
    }

    fn validate(&self, n_items: usize) -> Result<()> {
        // No k is valid for an empty set.
        if n_items == 0 {
            return Err(ClusterError::InvalidRange {
                min_k: self.min_k,
                max_k: self.max_k,
            });
        }
        if self.step == 0 {
            return Err(ClusterError::InvalidParameter {
                name: "step",
                message: "must be at least 1".to_string(),
            });
        }
        if self.min_k > self.max_k {
            return Err(ClusterError::InvalidRange {
                min_k: self.min_k,
                max_k: self.max_k,
            });
        }
        if self.min_k == 0 {
            return Err(ClusterError::InvalidClusterCount {
                requested: 0,
                n_items,
            });
        }
        if self.max_k > n_items {
            return Err(ClusterError::InvalidClusterCount {
                requested: self.max_k,
                n_items,
            });
        }
        Ok(())
    }
}

/// Receives every new best model as soon as it is found.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    /// `evaluated_through` is the largest k evaluated so far.
    async fn on_new_best(
        &self,
        best: &ClusteringResult,
        evaluated_through: usize,
        items: &VectorSet,
    ) -> Result<()>;
}

/// Sink that drops checkpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckpoint;

#[async_trait]
impl CheckpointSink for NoCheckpoint {
    async fn on_new_best(&self, _: &ClusteringResult, _: usize, _: &VectorSet) -> Result<()> {
        Ok(())
    }
}

/// Score of one evaluated candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub k: usize,
    pub wcss: f64,
    pub iterations: usize,
    pub improved: bool,
}

/// Why the search ended. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// WCSS at `at_k` did not improve on `best_k`.
    Elbow { at_k: usize, best_k: usize },
    /// Every candidate up to `last_k` was evaluated.
    RangeExhausted { last_k: usize },
}

/// Final result of the search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: ClusteringResult,
    pub evaluated: Vec<CandidateScore>,
    pub stop: StopReason,
}

impl SearchOutcome {
    pub fn best_k(&self) -> usize {
        self.best.k
    }

    pub fn best_score(&self) -> f64 {
        self.best.wcss
    }

    pub fn best_centroids(&self) -> &[super::Centroid] {
        &self.best.centroids
    }
}

/// Where an interrupted search picks up.
#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub best: ClusteringResult,
    pub next_k: usize,
}

/// Progress callback: invoked once per evaluated candidate.
pub type ProgressFn = Box<dyn Fn(&CandidateScore) + Send + Sync>;

/// Drives a [`CandidateEvaluator`] across the k range.
pub struct ElbowSearch<E> {
    evaluator: E,
    params: SearchParams,
    progress: Option<ProgressFn>,
}

impl<E: CandidateEvaluator> ElbowSearch<E> {
    pub fn new(evaluator: E, params: SearchParams) -> Self {
        Self {
            evaluator,
            params,
            progress: None,
        }
    }

    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&CandidateScore) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn params(&self) -> SearchParams {
        self.params
    }

    /// Run the search from `min_k`.
    pub async fn select_model<S>(&self, items: &VectorSet, sink: &S) -> Result<SearchOutcome>
    where
        S: CheckpointSink + ?Sized,
    {
        self.select_model_resuming(items, sink, None).await
    }

    /// Run the search, optionally continuing from a previous best.
    pub async fn select_model_resuming<S>(
        &self,
        items: &VectorSet,
        sink: &S,
        resume: Option<ResumePoint>,
    ) -> Result<SearchOutcome>
    where
        S: CheckpointSink + ?Sized,
    {
        self.params.validate(items.len())?;

        let (mut best, start_k) = match resume {
            Some(point) => {
                tracing::info!(
                    "Resuming search at k={} (best so far k={}, WCSS {:.4})",
                    point.next_k,
                    point.best.k,
                    point.best.wcss
                );
                (Some(point.best), point.next_k)
            }
            None => (None, self.params.min_k),
        };

        let mut evaluated = Vec::new();
        let mut stop = None;
        let mut last_k = best.as_ref().map(|b| b.k).unwrap_or(self.params.min_k);

        for k in self.params.candidates().filter(|&k| k >= start_k) {
            tracing::info!("Testing k={}...", k);
            let result = self.evaluator.evaluate(items, k)?;
            last_k = k;

            let improved = match &best {
                Some(current) => result.wcss < current.wcss,
                None => true,
            };

            let score = CandidateScore {
                k,
                wcss: result.wcss,
                iterations: result.iterations,
                improved,
            };
            tracing::info!(
                "WCSS for k={}: {:.6} ({} iterations, {})",
                k,
                result.wcss,
                result.iterations,
                result.termination
            );
            if let Some(progress) = &self.progress {
                progress(&score);
            }
            evaluated.push(score);

            if !improved {
                // best is always Some once a candidate has been scored
                let best_k = best.as_ref().map(|b| b.k).unwrap_or(k);
                tracing::info!("Elbow found at k={} (WCSS rose at k={})", best_k, k);
                stop = Some(StopReason::Elbow { at_k: k, best_k });
                break;
            }

            sink.on_new_best(&result, k, items).await?;
            tracing::info!("Updated best model: k={}", k);
            best = Some(result);
        }

        let best = best.ok_or(ClusterError::InvalidRange {
            min_k: start_k,
            max_k: self.params.max_k,
        })?;
        let stop = stop.unwrap_or(StopReason::RangeExhausted { last_k });

        Ok(SearchOutcome {
            best,
            evaluated,
            stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{KMeans, Termination};
    use crate::vectors::Item;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Returns scripted WCSS values per k.
    struct Scripted {
        scores: HashMap<usize, f64>,
        calls: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(pairs: &[(usize, f64)]) -> Self {
            Self {
                scores: pairs.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CandidateEvaluator for Scripted {
        fn evaluate(&self, items: &VectorSet, k: usize) -> Result<ClusteringResult> {
            self.calls.lock().unwrap().push(k);
            Ok(ClusteringResult {
                k,
                centroids: vec![vec![0.0; items.dimension()]; k],
                wcss: self.scores[&k],
                iterations: 1,
                termination: Termination::Stable,
            })
        }
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait]
    impl CheckpointSink for Recording {
        async fn on_new_best(
            &self,
            best: &ClusteringResult,
            evaluated_through: usize,
            _: &VectorSet,
        ) -> Result<()> {
            self.seen.lock().unwrap().push((best.k, evaluated_through));
            Ok(())
        }
    }

    fn items(n: usize) -> VectorSet {
        VectorSet::new(
            (0..n)
                .map(|i| Item::new(i.to_string(), vec![i as f32, 1.0], format!("t{}", i)))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_first_increase() {
        let evaluator = Scripted::new(&[(10, 100.0), (15, 80.0), (20, 60.0), (25, 65.0), (30, 50.0)]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(10, 30, 5));
        let sink = Recording::default();

        let outcome = search.select_model(&items(40), &sink).await.unwrap();

        assert_eq!(outcome.best_k(), 20);
        assert_eq!(outcome.best_score(), 60.0);
        assert_eq!(outcome.stop, StopReason::Elbow { at_k: 25, best_k: 20 });
        assert_eq!(*search.evaluator.calls.lock().unwrap(), vec![10, 15, 20, 25]);
        assert_eq!(*sink.seen.lock().unwrap(), vec![(10, 10), (15, 15), (20, 20)]);
    }

    #[tokio::test]
    async fn test_equal_wcss_counts_as_no_improvement() {
        let evaluator = Scripted::new(&[(2, 10.0), (3, 10.0), (4, 1.0)]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(2, 4, 1));
        let outcome = search.select_model(&items(10), &NoCheckpoint).await.unwrap();
        assert_eq!(outcome.best_k(), 2);
        assert_eq!(outcome.evaluated.len(), 2);
    }

    #[tokio::test]
    async fn test_range_exhausted() {
        let evaluator = Scripted::new(&[(1, 9.0), (3, 4.0), (5, 1.0)]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(1, 6, 2));
        let outcome = search.select_model(&items(10), &NoCheckpoint).await.unwrap();
        assert_eq!(outcome.best_k(), 5);
        assert_eq!(outcome.stop, StopReason::RangeExhausted { last_k: 5 });
    }

    #[tokio::test]
    async fn test_invalid_range_before_clustering() {
        let evaluator = Scripted::new(&[]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(5, 3, 1));
        let result = search.select_model(&items(10), &NoCheckpoint).await;
        assert!(matches!(result, Err(ClusterError::InvalidRange { min_k: 5, max_k: 3 })));
        assert!(search.evaluator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_set_rejected() {
        let search = ElbowSearch::new(KMeans::default(), SearchParams::new(1, 2, 1));
        let empty = VectorSet::new(Vec::new()).unwrap();
        assert!(matches!(
            search.select_model(&empty, &NoCheckpoint).await,
            Err(ClusterError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_max_k_above_item_count() {
        let search = ElbowSearch::new(KMeans::default(), SearchParams::new(1, 20, 1));
        assert!(matches!(
            search.select_model(&items(5), &NoCheckpoint).await,
            Err(ClusterError::InvalidClusterCount { requested: 20, n_items: 5 })
        ));
    }

    #[tokio::test]
    async fn test_resume_skips_evaluated_candidates() {
        let evaluator = Scripted::new(&[(10, 100.0), (15, 80.0), (20, 60.0), (25, 65.0)]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(10, 30, 5));
        let prior = ClusteringResult {
            k: 15,
            centroids: vec![vec![0.0, 0.0]; 15],
            wcss: 80.0,
            iterations: 3,
            termination: Termination::Stable,
        };
        let outcome = search
            .select_model_resuming(&items(40), &NoCheckpoint, Some(ResumePoint { best: prior, next_k: 20 }))
            .await
            .unwrap();

        assert_eq!(outcome.best_k(), 20);
        assert_eq!(*search.evaluator.calls.lock().unwrap(), vec![20, 25]);
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let evaluator = Scripted::new(&[(1, 5.0), (2, 6.0)]);
        let search = ElbowSearch::new(evaluator, SearchParams::new(1, 2, 1))
            .with_progress(move |score| sink_seen.lock().unwrap().push((score.k, score.improved)));

        search.select_model(&items(4), &NoCheckpoint).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, true), (2, false)]);
    }

    #[test]
    fn test_clamp_to_sqrt() {
        let params = SearchParams::new(10, 50, 5).clamp_to_sqrt(900);
        assert_eq!(params.max_k, 30);
        let params = SearchParams::new(10, 50, 5).clamp_to_sqrt(10_000);
        assert_eq!(params.max_k, 50);
    }

    #[test]
    fn test_candidates() {
        let ks: Vec<usize> = SearchParams::new(10, 30, 5).candidates().collect();
        assert_eq!(ks, vec![10, 15, 20, 25, 30]);
        let ks: Vec<usize> = SearchParams::new(10, 28, 5).candidates().collect();
        assert_eq!(ks, vec![10, 15, 20, 25]);
    }

    #[tokio::test]
    async fn test_with_kmeans_end_to_end() {
        let mut points = Vec::new();
        for center in [[0.0f32, 0.0], [20.0, 0.0], [0.0, 20.0]] {
            for j in 0..5 {
                points.push(vec![center[0] + j as f32 * 0.1, center[1] + (j % 2) as f32 * 0.1]);
            }
        }
        // Interleave so the first three seeds come from different blobs
        let mut ordered = Vec::new();
        for j in 0..5 {
            for b in 0..3 {
                ordered.push(points[b * 5 + j].clone());
            }
        }
        let set = VectorSet::new(
            ordered
                .into_iter()
                .enumerate()
                .map(|(i, v)| Item::new(i.to_string(), v, "x"))
                .collect(),
        )
        .unwrap();

        let search = ElbowSearch::new(KMeans::default(), SearchParams::new(1, 3, 1));
        let outcome = search.select_model(&set, &NoCheckpoint).await.unwrap();
        assert_eq!(outcome.best_k(), 3);
        assert_eq!(outcome.best_centroids().len(), 3);
    }
}
