//! End-to-end clustering run: elbow search with checkpointing.

use crate::assemble::{Checkpoint, CheckpointWriter, Checkpointer, ResultAssembler};
use crate::cluster::{ElbowSearch, KMeans, ResumePoint, SearchOutcome, StopReason};
use crate::config::AppConfig;
use crate::error::Result;
use crate::naming::ClusterNamer;
use crate::vectors::VectorSet;
use std::fmt::Write as _;
use std::sync::Arc;

/// Options that vary per invocation rather than per configuration.
#[derive(Default, Clone)]
pub struct RunOptions {
    pub namer: Option<Arc<dyn ClusterNamer>>,
    /// Continue from the checkpoint found in the output directory, if any
    pub resume: bool,
}

/// Search for the best k over `items`, writing a checkpoint to
/// `config.output_dir` on every improvement.
pub async fn run_clustering(
    config: &AppConfig,
    items: &VectorSet,
    options: RunOptions,
) -> Result<SearchOutcome> {
    let clustering = &config.clustering;
    let params = clustering.search_params(items.len());
    tracing::info!(
        "Finding optimal number of clusters: k in {}..={} step {} over {} items",
        params.min_k,
        params.max_k,
        params.step,
        items.len()
    );

    let mut assembler = ResultAssembler::new(clustering.sample_size);
    if let Some(namer) = options.namer {
        assembler = assembler.with_namer(namer);
    }

    // Checkpoints left by earlier runs are replaced by this run's first one
    let writer = CheckpointWriter::new(&config.output_dir).adopt_existing()?;
    let mut resume: Option<ResumePoint> = None;
    if options.resume {
        if let Some(path) = CheckpointWriter::latest(&config.output_dir)? {
            let checkpoint = Checkpoint::load(&path)?;
            tracing::info!("Found checkpoint {:?} (k={})", path, checkpoint.k);
            resume = Some(checkpoint.resume_point(items, params.step)?);
        } else {
            tracing::info!("No checkpoint in {:?}, starting fresh", config.output_dir);
        }
    }

    let engine = KMeans::new(clustering.max_iterations)
        .with_threshold(clustering.convergence_threshold);
    let search = ElbowSearch::new(engine, params);
    let sink = Checkpointer::new(assembler, writer);

    let outcome = search.select_model_resuming(items, &sink, resume).await?;
    tracing::info!("Optimal k: {}", outcome.best_k());
    Ok(outcome)
}

/// Human-readable summary of a finished search.
pub fn report(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    for score in &outcome.evaluated {
        let _ = writeln!(
            out,
            "k={:<4} WCSS={:<16.6} iterations={:<4}{}",
            score.k,
            score.wcss,
            score.iterations,
            if score.improved { " *" } else { "" }
        );
    }
    match outcome.stop {
        StopReason::Elbow { at_k, best_k } => {
            let _ = writeln!(out, "Elbow at k={} (WCSS did not improve at k={})", best_k, at_k);
        }
        StopReason::RangeExhausted { last_k } => {
            let _ = writeln!(out, "Search range exhausted at k={}", last_k);
        }
    }
    let _ = writeln!(
        out,
        "Best k={} WCSS={:.6} after {} iterations ({})",
        outcome.best.k, outcome.best.wcss, outcome.best.iterations, outcome.best.termination
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{CandidateScore, ClusteringResult, Termination};

    #[test]
    fn test_report_mentions_stop_and_iterations() {
        let outcome = SearchOutcome {
            best: ClusteringResult {
                k: 20,
                centroids: vec![],
                wcss: 60.0,
                iterations: 12,
                termination: Termination::IterationCap,
            },
            evaluated: vec![
                CandidateScore { k: 20, wcss: 60.0, iterations: 12, improved: true },
                CandidateScore { k: 25, wcss: 65.0, iterations: 9, improved: false },
            ],
            stop: StopReason::Elbow { at_k: 25, best_k: 20 },
        };
        let text = report(&outcome);
        assert!(text.contains("Elbow at k=20"));
        assert!(text.contains("iterations=12"));
        assert!(text.contains("iteration cap"));
    }
}
