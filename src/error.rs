use thiserror::Error;

/// Errors that can occur while administering or recording stats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// A key, name, or set of distribution bounds failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A measure or view with the same name is already registered with different attributes.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// No measure or view exists under the given name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target is still referenced and cannot be removed.
    #[error("in use: {0}")]
    InUse(String),

    /// The view has no subscribers and no forced collection, so there is nothing to retrieve.
    #[error("not collecting: {0}")]
    NotCollecting(String),

    /// A command could not be delivered to, or answered by, the worker thread in time.
    #[error("worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl From<String> for MetricsError {
    fn from(value: String) -> Self {
        Self::InvalidArgument(value)
    }
}

impl From<&str> for MetricsError {
    fn from(value: &str) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}
