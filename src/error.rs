//! Crate-wide error type for the plumbing layer (I/O, config, listener setup).
//!
//! Per-message parsers do not use this type: spec.md §4.6/§7 requires that they
//! assert on structural invariants rather than propagate `Result`. See
//! [`crate::decoder::dispatch::DecodeOutcome`] for that control flow.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("listener setup failed: {0}")]
    Listen(String),

    #[error("logging initialization failed: {0}")]
    Logging(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
