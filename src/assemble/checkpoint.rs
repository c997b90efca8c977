//! Best-so-far checkpoints.
//!
//! Every time the elbow search finds a better model the whole summary set is
//! rebuilt and written to `best_clusters_k{k}.json`. Files are written through a
//! temporary file and renamed into place, and the previous checkpoint is removed,
//! so the output directory holds exactly one complete checkpoint at a time.

use super::{ClusterSummary, ResultAssembler};
use crate::cluster::{CheckpointSink, ClusteringResult, ResumePoint, Termination};
use crate::error::{ClusterError, Result};
use crate::vectors::VectorSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const FILE_PREFIX: &str = "best_clusters_k";

/// Persisted best model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub k: usize,
    pub wcss: f64,
    pub iterations: usize,
    pub termination: Termination,
    /// Largest k evaluated when this checkpoint was written
    pub evaluated_through: usize,
    pub item_count: usize,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub clusters: Vec<ClusterSummary>,
}

impl Checkpoint {
    pub fn new(
        best: &ClusteringResult,
        evaluated_through: usize,
        items: &VectorSet,
        clusters: Vec<ClusterSummary>,
    ) -> Self {
        Self {
            k: best.k,
            wcss: best.wcss,
            iterations: best.iterations,
            termination: best.termination,
            evaluated_through,
            item_count: items.len(),
            dimension: items.dimension(),
            created_at: Utc::now(),
            clusters,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Rebuild the search state this checkpoint represents so a search can
    /// continue at the next k. Fails if the checkpoint was made for other data.
    pub fn resume_point(&self, items: &VectorSet, step: usize) -> Result<ResumePoint> {
        if self.item_count != items.len() || self.dimension != items.dimension() {
            return Err(ClusterError::CheckpointMismatch(format!(
                "checkpoint has {} items of dimension {}, input has {} of dimension {}",
                self.item_count,
                self.dimension,
                items.len(),
                items.dimension()
            )));
        }
        if self.clusters.len() != self.k {
            return Err(ClusterError::CheckpointMismatch(format!(
                "checkpoint declares k={} but stores {} clusters",
                self.k,
                self.clusters.len()
            )));
        }

        Ok(ResumePoint {
            best: ClusteringResult {
                k: self.k,
                centroids: self.clusters.iter().map(|c| c.centroid.clone()).collect(),
                wcss: self.wcss,
                iterations: self.iterations,
                termination: self.termination,
            },
            next_k: self.evaluated_through + step.max(1),
        })
    }
}

/// Writes checkpoints into a directory, replacing the previous ones.
pub struct CheckpointWriter {
    dir: PathBuf,
    previous: Mutex<Vec<PathBuf>>,
}

impl CheckpointWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            previous: Mutex::new(Vec::new()),
        }
    }

    /// Adopt every checkpoint file already in the directory, so the first
    /// write of this run leaves only its own file behind.
    pub fn adopt_existing(self) -> Result<Self> {
        let existing = checkpoint_files(&self.dir)?;
        if !existing.is_empty() {
            tracing::debug!(
                "{} existing checkpoint(s) in {:?} will be replaced",
                existing.len(),
                self.dir
            );
        }
        self.previous
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(existing.into_iter().map(|(_, path)| path));
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, k: usize) -> PathBuf {
        self.dir.join(format!("{}{}.json", FILE_PREFIX, k))
    }

    /// Atomically write `checkpoint` and remove the previous file.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(checkpoint.k);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), checkpoint)?;
        tmp.as_file_mut().flush()?;
        tmp.persist(&path).map_err(|e| ClusterError::Io(e.error))?;

        let mut previous = self.previous.lock().unwrap_or_else(|e| e.into_inner());
        for old in previous.drain(..).filter(|old| *old != path) {
            if let Err(e) = std::fs::remove_file(&old) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not remove old checkpoint {:?}: {}", old, e);
                }
            }
        }
        previous.push(path.clone());

        Ok(path)
    }

    /// Find the most recently written checkpoint in `dir`, by `created_at`.
    /// Files that do not parse as checkpoints are skipped.
    pub fn latest<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>> {
        let mut found: Option<(DateTime<Utc>, usize, PathBuf)> = None;
        for (k, path) in checkpoint_files(dir.as_ref())? {
            let checkpoint = match Checkpoint::load(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping unreadable checkpoint {:?}: {}", path, e);
                    continue;
                }
            };
            let newer = found
                .as_ref()
                .map_or(true, |(at, best_k, _)| (checkpoint.created_at, k) > (*at, *best_k));
            if newer {
                found = Some((checkpoint.created_at, k, path));
            }
        }
        Ok(found.map(|(_, _, path)| path))
    }
}

/// `best_clusters_k{k}.json` files in `dir` with their k.
fn checkpoint_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let k = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(FILE_PREFIX))
            .and_then(|n| n.strip_suffix(".json"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(k) = k {
            files.push((k, path));
        }
    }
    files.sort();
    Ok(files)
}

/// Checkpoint sink that assembles summaries and writes them to disk.
pub struct Checkpointer {
    assembler: ResultAssembler,
    writer: CheckpointWriter,
}

impl Checkpointer {
    pub fn new(assembler: ResultAssembler, writer: CheckpointWriter) -> Self {
        Self { assembler, writer }
    }

    pub fn writer(&self) -> &CheckpointWriter {
        &self.writer
    }
}

#[async_trait]
impl CheckpointSink for Checkpointer {
    async fn on_new_best(
        &self,
        best: &ClusteringResult,
        evaluated_through: usize,
        items: &VectorSet,
    ) -> Result<()> {
        let clusters = self.assembler.assemble(&best.centroids, items).await?;
        let checkpoint = Checkpoint::new(best, evaluated_through, items, clusters);
        let path = self.writer.write(&checkpoint)?;
        tracing::info!("Updated best clusters (k={}) saved to {:?}", best.k, path);
        Ok(())
    }
}
