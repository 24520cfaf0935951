//! Error types for the divergence metric.

use thiserror::Error;

/// Main error type for kernel and accumulator operations.
///
/// Every variant is a contract violation by the caller; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsdError {
    /// `p` and `q` do not have the same shape
    #[error("Predictions and targets are expected to have the same shape, but got {p:?} and {q:?}")]
    ShapeMismatch { p: Vec<usize>, q: Vec<usize> },

    /// Inputs are not `(N, d)` batches
    #[error("Expected both p and q distributions to be 2D but got {p} and {q} respectively")]
    InvalidRank { p: usize, q: usize },

    /// Bad constructor or configuration argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Two states with different storage modes were merged
    #[error("State mismatch: {0}")]
    StateMismatch(String),

    /// A streaming worker task panicked or was cancelled
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for divergence operations.
pub type Result<T> = std::result::Result<T, JsdError>;

impl From<serde_json::Error> for JsdError {
    fn from(err: serde_json::Error) -> Self {
        JsdError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "wasm")]
impl From<JsdError> for wasm_bindgen::JsValue {
    fn from(err: JsdError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
