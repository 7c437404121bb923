//! Typed errors for the hydration pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`); the `hydrate`
//! binary wraps these with context at the edge.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a hydration run.
///
/// Per-batch API failures other than rate limiting never surface here; the
/// fetcher degrades them into unresolved identifiers.
#[derive(Debug, Error)]
pub enum HydrateError {
    /// Invalid setting (bad env value, batch size out of range, missing token)
    #[error("config error: {0}")]
    Config(String),

    /// Input corpus could not be opened or read
    #[error("cannot read input {path}: {source}")]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input corpus has no `tweet_id` header
    #[error("input {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: String },

    /// Input corpus row is unusable
    #[error("malformed input {path} at line {line}: {reason}")]
    MalformedInput {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Existing result store is unreadable; refusing to discard prior work
    #[error("result store {path} is malformed: {reason}")]
    ResultStore { path: PathBuf, reason: String },

    /// Progress log or missing list exists but could not be read
    #[error("cannot read run file {path}: {source}")]
    RunFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Durable write failed
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Batch still rate limited after every allowed cooldown
    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// Log sink could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for hydration operations.
pub type Result<T> = std::result::Result<T, HydrateError>;

impl HydrateError {
    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HydrateError::Persist {
            path: path.into(),
            source,
        }
    }

    /// Persist failure raised by the `csv` writer.
    pub(crate) fn persist_csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let source = match source.into_kind() {
            csv::ErrorKind::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, format!("{:?}", other)),
        };
        Self::persist(path, source)
    }
}
