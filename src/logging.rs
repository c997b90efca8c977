use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing: stderr output, plus an appended log file when `log_file` is set.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if verbose {
        "kluster=debug,info"
    } else {
        "kluster=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Get the default log file path
pub fn default_log_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("kluster").join("kluster.log")
    } else {
        PathBuf::from("kluster.log")
    }
}
