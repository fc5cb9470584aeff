//! Error types for the object pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Opaque error raised by an [`ObjectFactory`](crate::ObjectFactory).
///
/// The pool never looks inside it; it only reports that a creation or
/// destruction failed.
pub type FactoryError = Arc<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool is at maximum capacity")]
    PoolFull,

    #[error("Pool is empty - no objects available")]
    PoolEmpty,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid pool options: {0}")]
    InvalidOptions(String),

    #[error("Object factory failed: {0}")]
    Factory(FactoryError),

    #[error("Metrics export failed: {0}")]
    Metrics(String),
}

impl PoolError {
    pub(crate) fn invalid_options(msg: impl Into<String>) -> Self {
        PoolError::InvalidOptions(msg.into())
    }

    /// Whether a caller should back off and retry.
    ///
    /// `PoolEmpty` and `Timeout` describe momentary states of the pool, every
    /// other variant needs attention.
    pub fn is_transient(&self) -> bool {
        matches!(self, PoolError::PoolEmpty | PoolError::Timeout(_))
    }
}

impl From<FactoryError> for PoolError {
    fn from(err: FactoryError) -> Self {
        PoolError::Factory(err)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
