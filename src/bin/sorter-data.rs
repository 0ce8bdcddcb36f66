//! Training-data capture utility.
//!
//! Captures numbered frames of one category for training the classifier.
//!
//! **Usage:**
//! ```bash
//! sorter-data <category> [count] [--root data]
//! ```
//!
//! Frames land in `<root>/<category>/0.jpg`, `1.jpg`, ... Without a count
//! it keeps capturing until killed.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{info, warn};

use sorter::adapters::logger;
use sorter::capture::TrainingCapture;
use sorter::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, SorterConfig};
use sorter::error::Error;

/// Capture training frames for one category
#[derive(Parser, Debug)]
#[command(name = "sorter-data", version)]
struct Args {
    /// Category the frames belong to (becomes a directory name)
    category: String,

    /// Stop after this many frames
    count: Option<u32>,

    /// Directory holding one sub-directory per category
    #[arg(long, default_value = "data")]
    root: PathBuf,

    /// JSON config file providing the capture settings
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Consecutive failed captures before giving up
    #[arg(long, default_value = "5")]
    max_failures: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(logger::level_from_env()).map_err(|e| anyhow!("logger init failed: {e}"))?;
    info!("Item sorter v{} (training capture)", sorter::VERSION);

    let config = SorterConfig::load(&args.config)
        .map_err(Error::from)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let mut capture = TrainingCapture::new(&config.capture, &args.root, &args.category)
        .with_context(|| format!("preparing {}/{}", args.root.display(), args.category))?;
    info!("Capturing '{}' frames into {}", args.category, capture.dir().display());

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    futures_lite::future::block_on(executor.run(async {
        let mut failures = 0u32;
        while args.count.is_none_or(|n| capture.captured() < n) {
            match capture.capture_next().await {
                Some(path) => {
                    failures = 0;
                    info!("Saved {}", path.display());
                }
                None => {
                    failures += 1;
                    warn!("Capture failed ({}/{})", failures, args.max_failures);
                    if failures >= args.max_failures {
                        bail!("{} consecutive captures failed", failures);
                    }
                }
            }
        }
        info!("Captured {} frames", capture.captured());
        Ok(())
    }))
}
