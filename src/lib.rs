//! xtap: a man-in-the-middle logger for the X11 wire protocol. Bytes
//! between a client and an upstream server are relayed unchanged (except
//! the one sanctioned `QueryExtension` mutation, see `decoder::replies`)
//! while every request, reply, event, and error is rendered to a structured
//! trace sink.
//!
//! The crate is organized the way the decoder core and its surrounding
//! plumbing actually divide:
//!
//! - [`decoder`] — the protocol core: alignment, byte order, the value
//!   formatter, list parsing, connection/atom/extension state, the
//!   connection-setup parser, and the four opcode dispatch tables.
//! - [`relay`] — the accept loop, per-connection session, and the startup
//!   atom pre-fetch helper.
//! - [`settings`] / [`cli`] — configuration merged from a TOML file and CLI
//!   flags.
//! - [`logging`] — operational logging, separate from the protocol trace.
//! - [`error`] — the plumbing-layer error type.

pub mod cli;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod relay;
pub mod settings;

pub use error::{Error, Result};
