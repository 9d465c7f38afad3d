// main.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use xtap::{cli::Args, relay, settings::Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args).context("failed to load configuration")?;

    xtap::logging::init_logging(settings.verbose).context("failed to initialize logging")?;

    let settings = Arc::new(settings);
    let prefetched_atoms = Arc::new(relay::prefetch::prefetch(&settings).await);

    relay::listener::run(settings, prefetched_atoms).await.context("relay listener failed")?;

    Ok(())
}
