//! # Error Types
//!
//! Errors here are configuration and shape failures: attempts to wire a
//! matrix or index into a place whose declared dimensions disagree with it.
//!
//! Every variant is fatal at the point of construction. Nothing in the core
//! pads, truncates or broadcasts to paper over a mismatch.

use thiserror::Error;

use crate::shape::Shape;

/// Core errors for shape-checked matrices and indices.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A tensor's physical shape disagrees with its declared shape.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// A column or row position falls outside the indexed space.
    #[error("Index out of bounds: {index} (capacity {cap})")]
    IndexOutOfBounds { index: usize, cap: usize },

    /// Partitioning asked for more (or fewer than one) ranges than the pool allows.
    #[error("Cannot partition {cap} positions into {count} ranges")]
    InvalidPartition { count: usize, cap: usize },

    /// A categorical value is negative, fractional or not below its bin count.
    #[error("Category {value} out of range for {bins} bins")]
    CategoryOutOfRange { value: f32, bins: usize },

    /// Static configuration is inconsistent.
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The tensor substrate rejected an operation.
    #[error("Tensor backend error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl CoreError {
    /// Convenience constructor for [`CoreError::Configuration`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
