//! Structured error types for pairdist.

use thiserror::Error;

/// Unified error type for all pairdist operations.
#[derive(Debug, Error)]
pub enum PairdistError {
    /// Metric name not present in the registry.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// GPU path requested but no usable device, driver, kernel or memory.
    ///
    /// Recoverable: callers may rerun the same block on the CPU backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Tensor or block dimensions do not line up.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PairdistError {
    /// Whether rerunning on the CPU backend may succeed.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

/// Convenience alias used throughout pairdist.
pub type Result<T> = std::result::Result<T, PairdistError>;
