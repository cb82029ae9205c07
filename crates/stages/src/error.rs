//! Error types for pipeline stages.

use tabgan_core::{CoreError, Dim};
use thiserror::Error;

/// Errors raised while building or running stages.
///
/// Dimension mismatches are configuration errors: a combinator whose
/// children do not add up to its declared widths cannot be built.
#[derive(Debug, Error)]
pub enum StageError {
    /// Declared widths of children (or neighbours) disagree.
    #[error("Dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: Dim,
        got: Dim,
    },

    /// Static stage configuration is invalid.
    #[error("Invalid stage configuration: {reason}")]
    Configuration { reason: String },

    /// Shape or index failure from the matrix layer.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StageError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Fail with [`StageError::DimensionMismatch`] unless `got == expected`.
pub fn check_dim(what: &'static str, expected: Dim, got: Dim) -> Result<(), StageError> {
    if expected != got {
        return Err(StageError::DimensionMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

