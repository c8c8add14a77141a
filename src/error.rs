use thiserror::Error;

/// Errors raised by a track snapshot source.
///
/// Only `Unavailable` demotes a source; everything else is treated as
/// "no snapshot this cycle" by the arbiter.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Initialization failed, the source stays demoted until re-initialized
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// A single poll or control call failed
    #[error("transient source error: {0}")]
    Transient(String),

    /// The source does not implement the requested operation
    #[error("operation not supported by this source")]
    Unsupported,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transient(err.to_string())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Transient(err.to_string())
    }
}

/// Errors raised while fetching lyrics from a provider backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("request encryption failed: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the persistent lyrics cache. Never fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to publish cache entry: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Why a single time-coded lyric line was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineParseError {
    #[error("line has no leading time tag")]
    MissingTimestamp,

    #[error("invalid time tag `{0}`")]
    InvalidTimestamp(String),

    #[error("metadata tag `{0}`")]
    Metadata(String),
}
