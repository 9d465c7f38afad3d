//! Operational logging setup (distinct from the protocol trace sink).
//!
//! Grounded on the teacher's `core/logging.rs`: an `EnvFilter` over a single
//! `tracing_subscriber::fmt` layer. xtap drops the teacher's JSON/file-layer
//! branching because the protocol trace — the thing operators actually
//! watch — is its own sink (`decoder::dispatch` writes to it directly, see
//! `settings::OutputSettings`); operational logs only need a console layer.

use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{Error, Result};

pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Logging(format!("failed to initialize logging: {e}")))?;

    tracing::info!("xtap operational logging initialized (verbose={verbose})");
    Ok(())
}
