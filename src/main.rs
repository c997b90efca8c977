//! kluster - cluster embedded texts and name the clusters
//!
//! Reads a JSON file of embedded records, searches for a good number of
//! clusters with the elbow method and writes the best clusters found so far
//! to the output directory after every improvement.

use clap::Parser;
use kluster::{
    config::AppConfig,
    error::ClusterError,
    logging,
    naming::{ClusterNamer, LlmNamer},
    pipeline::{self, RunOptions},
    vectors::VectorSet,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Cluster an embeddings file
    Cluster {
        /// JSON array of records with `tweet` and `embedding` fields
        input: PathBuf,
        /// Directory for checkpoint files
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Smallest k to try
        #[arg(long)]
        min_k: Option<usize>,
        /// Largest k to try
        #[arg(long)]
        max_k: Option<usize>,
        /// Increment between candidate k values
        #[arg(long)]
        step: Option<usize>,
        /// Iteration cap per K-means run
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Representative items kept per cluster
        #[arg(long)]
        sample_size: Option<usize>,
        /// Skip LLM cluster naming
        #[arg(long)]
        no_names: bool,
        /// Do not bound max k by the square root of the item count
        #[arg(long)]
        no_clamp: bool,
        /// Continue from the checkpoint in the output directory
        #[arg(long)]
        resume: bool,
    },
    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "kluster")]
#[command(version)]
#[command(about = "Elbow-searched K-means clustering for text embeddings", long_about = None)]
struct Args {
    /// Configuration file path (overrides defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::InitConfig { path } => {
            AppConfig::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
            Ok(())
        }
        Command::Cluster {
            input,
            out_dir,
            min_k,
            max_k,
            step,
            max_iterations,
            sample_size,
            no_names,
            no_clamp,
            resume,
        } => {
            let mut config = AppConfig::load(args.config.as_deref())?;
            logging::init_logging(args.verbose || config.debug, args.log_file.as_deref())?;

            // CLI overrides
            if let Some(dir) = out_dir {
                config.output_dir = dir;
            }
            if let Some(v) = min_k {
                config.clustering.min_k = v;
            }
            if let Some(v) = max_k {
                config.clustering.max_k = v;
            }
            if let Some(v) = step {
                config.clustering.k_step = v;
            }
            if let Some(v) = max_iterations {
                config.clustering.max_iterations = v;
            }
            if let Some(v) = sample_size {
                config.clustering.sample_size = v;
            }
            if no_names {
                config.naming.enabled = false;
            }
            if no_clamp {
                config.clustering.clamp_to_sqrt = false;
            }
            config.validate()?;

            let items = VectorSet::load_json(&input).map_err(fatal)?;

            let namer: Option<Arc<dyn ClusterNamer>> = if config.naming.enabled {
                match LlmNamer::from_config(&config.naming) {
                    Ok(namer) => {
                        tracing::info!(
                            "Naming clusters with {} via {}",
                            config.naming.model.model,
                            config.naming.model.provider
                        );
                        Some(Arc::new(namer) as Arc<dyn ClusterNamer>)
                    }
                    Err(e) => {
                        tracing::warn!("Cluster naming disabled: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let outcome =
                pipeline::run_clustering(&config, &items, RunOptions { namer, resume })
                    .await
                    .map_err(fatal)?;

            print!("{}", pipeline::report(&outcome));
            Ok(())
        }
    }
}

/// Bad input and bad parameters are reported as something the user must fix.
fn fatal(e: ClusterError) -> anyhow::Error {
    if e.is_input_error() {
        tracing::error!("Invalid input: {}", e);
        anyhow::Error::new(e).context("Invalid input or clustering parameters")
    } else {
        e.into()
    }
}
