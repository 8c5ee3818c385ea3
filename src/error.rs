//! Crate-wide error taxonomy.
//!
//! Leaf errors are plain `thiserror` enums; [`ServerError`] composes them
//! for anything that can fail during startup. CLI command handlers widen
//! further into `anyhow::Result`, matching the layering the rest of this
//! codebase's ancestry uses: precise types at the leaves, `anyhow` only at
//! the outermost command boundary.

use thiserror::Error;

/// Errors from [`crate::cache::ContentCache::acquire`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// The path could not be stat'd, isn't a regular file, or is below the
    /// minimum-size threshold.
    #[error("not found: {0}")]
    NotFound(String),

    /// The path existed and passed validation but reading it failed.
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from [`crate::dispatch::UrlDispatchTable::register`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler already registered for {method:?} {request}")]
    AlreadyRegistered { method: crate::transport::Method, request: String },
}

/// Errors that abort a server start.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server already running")]
    AlreadyRunning,

    #[error("must set www-root or url-handlers")]
    NoRoot,

    #[error("cache-size must be at least {min} bytes (got {got})")]
    CacheTooSmall { min: usize, got: usize },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("transport attach failed: {0}")]
    Attach(String),

    #[error("transport listen failed: {0}")]
    Listen(String),
}

/// Errors parsing the line-oriented CLI grammar (§6 of the spec).
#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown input `{0}`")]
    UnknownInput(String),

    #[error("missing value for `{0}`")]
    MissingValue(&'static str),

    #[error("invalid value for `{flag}`: {value}")]
    InvalidValue { flag: &'static str, value: String },

    #[error(transparent)]
    Server(#[from] ServerError),
}
