//! Kernel error type.
//!
//! Sub-crates define their own error enums and wrap `KernelError` as one
//! variant where they touch configuration or coefficients.

use thiserror::Error;

use crate::CoefficientId;

/// The top-level error type for `tdm-core`.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("coefficient {0} not found")]
    CoefficientNotFound(CoefficientId),

    #[error("duplicate coefficient {0}")]
    DuplicateCoefficient(CoefficientId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `tdm-core`.
pub type KernelResult<T> = Result<T, KernelError>;
