//! Address parsing errors.

use thiserror::Error;

/// Failure to turn text into a [`FileUrl`](crate::FileUrl).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("empty resource address")]
    Empty,

    /// Local paths must be absolute; there is no working directory to resolve against.
    #[error("not an absolute path: {0}")]
    NotAbsolute(String),

    #[error("invalid scheme: {0}")]
    InvalidScheme(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid host: {0}")]
    InvalidHost(String),
}
