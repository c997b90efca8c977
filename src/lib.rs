//! kluster - embedding clustering with elbow search
//!
//! Groups a collection of embedding vectors into a data-driven number of
//! clusters and picks, for each cluster, the items most representative of its
//! centroid.
//!
//! # Arquitectura
//!
//! - **K-means**: deterministic Lloyd iterations seeded from the first k vectors
//! - **Elbow search**: increasing k until WCSS stops improving, checkpointing
//!   every new best model
//! - **Ranking**: cosine similarity of items to each centroid
//! - **Naming**: optional LLM-generated cluster names with a placeholder fallback
//!
//! # Módulos Principales
//!
//! - [`vectors`] - validated input set
//! - [`cluster`] - K-means, WCSS, elbow search, ranking
//! - [`assemble`] - cluster summaries and checkpoints
//! - [`naming`] - naming collaborator and model providers
//! - [`pipeline`] - end-to-end run used by the CLI
//!
//! # Ejemplo de Uso
//!
//! ```rust,no_run
//! use kluster::cluster::{ElbowSearch, KMeans, NoCheckpoint, SearchParams};
//! use kluster::vectors::VectorSet;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let items = VectorSet::load_json("tweets_with_embeddings.json")?;
//! let params = SearchParams::new(10, 50, 5).clamp_to_sqrt(items.len());
//! let outcome = ElbowSearch::new(KMeans::new(100), params)
//!     .select_model(&items, &NoCheckpoint)
//!     .await?;
//! println!("best k = {}", outcome.best_k());
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod pipeline;
pub mod vectors;

pub use assemble::{ClusterSummary, ResultAssembler};
pub use cluster::{ClusteringResult, ElbowSearch, KMeans, SearchOutcome, SearchParams};
pub use error::{ClusterError, Result};
pub use naming::{ClusterNamer, UNNAMED_CLUSTER};
pub use vectors::{Item, VectorSet};
