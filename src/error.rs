//! Forseti error types

/// Forseti error types
///
/// Callers distinguish four families of outcomes: cache misses (normal,
/// never logged as errors), I/O failures (storage or network, including
/// cancellation), decode failures (stored data that no longer parses), and
/// analyzer failures (propagated verbatim, never cached). The classification
/// helpers below encode that taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ForsetiError {
    /// The requested entry is not in the cache. A normal outcome of `get`.
    #[error("cache miss")]
    CacheMiss,

    /// The storage or network layer failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The operation's cancellation handle fired before completion.
    ///
    /// Classified as an I/O-kind error ([`is_io()`](Self::is_io) returns
    /// `true`) so that callers treating storage failures uniformly also
    /// cover cancellation, while [`is_cancelled()`](Self::is_cancelled)
    /// still distinguishes it.
    #[error("operation cancelled")]
    Cancelled,

    /// A stored or received entry failed to parse.
    ///
    /// Treated as a miss for availability, but surfaced to telemetry so
    /// schema drift stays visible.
    #[error("decode error: {0}")]
    Decode(String),

    /// The external analyzer function failed.
    #[error("analyzer error: {0}")]
    Analyzer(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The pipeline is shutting down and can no longer accept or finish work.
    #[error("pipeline shutting down")]
    ShuttingDown,
}

impl ForsetiError {
    /// Whether this is a cache miss — the one non-exceptional `get` outcome.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::CacheMiss)
    }

    /// Whether this is an I/O-kind failure.
    ///
    /// Cancellation counts: a cancelled context surfaces as an I/O error
    /// whose kind is "cancelled".
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Cancelled)
    }

    /// Whether the operation was cut short by cancellation or shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ShuttingDown)
    }

    /// Whether a stored entry failed to decode.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<serde_json::Error> for ForsetiError {
    fn from(err: serde_json::Error) -> Self {
        ForsetiError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ForsetiError {
    fn from(err: std::io::Error) -> Self {
        ForsetiError::Io(err.to_string())
    }
}

/// Result type alias for Forseti operations
pub type Result<T> = std::result::Result<T, ForsetiError>;
