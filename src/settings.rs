// SPDX-License-Identifier: Apache-2.0

//! The read-only settings record spec.md §6 describes as consumed from an
//! external collaborator. Built by merging a TOML file (optional) with CLI
//! flags (teacher pattern: `config/types.rs`'s section-structured,
//! `serde`-derived config merged with `core/args.rs`'s `clap::Parser`).

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cli::Args;

/// Where the client-facing listener binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenSettings {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

/// The real X server this process relays to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpstreamSettings {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

/// Where the protocol trace (not operational logging) is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputSettings {
    Stdout,
    File(PathBuf),
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings::Stdout
    }
}

/// The decoder-facing settings record (spec.md §6's "Configuration consumed
/// from external collaborators"). Every field here is read, never mutated,
/// by `decoder::*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Verbosity: emit redundant wire fields (discriminator, sequence,
    /// length) and bitmask hex prefixes even when a name is known.
    pub verbose: bool,
    /// Multiline struct bodies vs. single-line.
    pub multiline: bool,
    /// Extensions for which QueryExtension's `present` byte is forced false
    /// before the reply is forwarded (spec.md §9, "the one sanctioned
    /// mutation").
    pub denied_extensions: HashSet<String>,
    /// Render TIMESTAMP fields with a wall-clock annotation derived from
    /// `reference_tick`/`reference_unix_time`.
    pub relative_timestamps: bool,
    /// Server tick corresponding to `reference_unix_time`.
    pub reference_tick: u32,
    /// Unix time (seconds) corresponding to `reference_tick`.
    pub reference_unix_time: i64,

    pub listen: Option<ListenSettingsConfig>,
    pub upstream: Option<UpstreamSettingsConfig>,
    #[serde(skip)]
    pub output: OutputSettings,
    /// Bound on the startup atom pre-fetch helper (spec.md §6).
    pub prefetch_atoms: u32,
}

/// TOML-friendly mirror of [`ListenSettings`]; kept distinct because the
/// CLI's `--listen` URI form and the TOML table form parse differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListenSettingsConfig {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<PathBuf>,
}

pub type UpstreamSettingsConfig = ListenSettingsConfig;

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            multiline: true,
            denied_extensions: HashSet::new(),
            relative_timestamps: false,
            reference_tick: 0,
            reference_unix_time: 0,
            listen: None,
            upstream: None,
            output: OutputSettings::Stdout,
            prefetch_atoms: 256,
        }
    }
}

impl Settings {
    pub fn load(args: &Args) -> crate::error::Result<Settings> {
        let mut settings = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => Settings::default(),
        };

        args.apply_overrides(&mut settings);
        Ok(settings)
    }
}

fn parse_endpoint(uri: &str) -> crate::error::Result<ListenSettingsConfig> {
    if let Some(path) = uri.strip_prefix("unix://") {
        return Ok(ListenSettingsConfig {
            scheme: "unix".into(),
            host: None,
            port: None,
            path: Some(PathBuf::from(path)),
        });
    }
    if let Some(hostport) = uri.strip_prefix("tcp://") {
        let (host, port) = hostport
            .rsplit_once(':')
            .ok_or_else(|| crate::error::Error::Config(format!("expected host:port in {uri}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| crate::error::Error::Config(format!("bad port in {uri}")))?;
        return Ok(ListenSettingsConfig {
            scheme: "tcp".into(),
            host: Some(host.to_string()),
            port: Some(port),
            path: None,
        });
    }
    Err(crate::error::Error::Config(format!(
        "unrecognized endpoint scheme in {uri} (expected tcp:// or unix://)"
    )))
}

pub(crate) fn resolve_listen(uri: &str) -> crate::error::Result<ListenSettingsConfig> {
    parse_endpoint(uri)
}
