// SPDX-License-Identifier: Apache-2.0
//
// Command-line arguments for xtap.
//
// Grounded on the teacher's `core/args.rs` (`clap::Parser`, one flat struct,
// `default_value` on everything so the binary runs with no arguments at all).

use std::path::PathBuf;

use crate::settings::{resolve_listen, ListenSettingsConfig, OutputSettings, Settings};

#[derive(clap::Parser)]
#[command(
    name = "xtap",
    about = "Interpose between an X11 client and server, relaying bytes unchanged and logging every message"
)]
pub struct Args {
    /// Where to accept client connections: tcp://HOST:PORT or unix:///path
    #[arg(long, default_value = "unix:///tmp/.X11-unix/X1")]
    pub listen: String,

    /// The real X server to relay to: tcp://HOST:PORT or unix:///path
    #[arg(long, default_value = "unix:///tmp/.X11-unix/X0")]
    pub upstream: String,

    /// Optional TOML config file; CLI flags below override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where the protocol trace is written: a path, or "-" for stdout.
    #[arg(short, long, default_value = "-")]
    pub output: String,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub multiline: bool,

    /// May be repeated: --deny-extension BIG-REQUESTS --deny-extension MIT-SHM
    #[arg(long = "deny-extension")]
    pub deny_extension: Vec<String>,

    #[arg(long)]
    pub relative_timestamps: bool,

    #[arg(long)]
    pub reference_tick: Option<u32>,

    #[arg(long)]
    pub reference_unix_time: Option<i64>,

    /// Number of GetAtomName requests the startup pre-fetch helper may issue.
    #[arg(long, default_value = "256")]
    pub prefetch_atoms: u32,
}

impl Args {
    /// Layer CLI flags on top of a loaded (or default) `Settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if self.verbose {
            settings.verbose = true;
        }
        if self.multiline {
            settings.multiline = true;
        }
        for ext in &self.deny_extension {
            settings.denied_extensions.insert(ext.clone());
        }
        if self.relative_timestamps {
            settings.relative_timestamps = true;
        }
        if let Some(t) = self.reference_tick {
            settings.reference_tick = t;
        }
        if let Some(t) = self.reference_unix_time {
            settings.reference_unix_time = t;
        }
        settings.prefetch_atoms = self.prefetch_atoms;

        settings.output = if self.output == "-" {
            OutputSettings::Stdout
        } else {
            OutputSettings::File(PathBuf::from(&self.output))
        };

        if let Ok(listen) = resolve_listen(&self.listen) {
            settings.listen = Some(listen);
        }
        if let Ok(upstream) = resolve_listen(&self.upstream) {
            settings.upstream = Some(upstream as ListenSettingsConfig);
        }
    }
}
