use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {what}; {hint}")]
    NotFound { what: String, hint: String },

    #[error("Embedding provider failed: {0}")]
    Provider(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::Provider(err.to_string())
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Argument and not-found errors are caller mistakes and must not be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
