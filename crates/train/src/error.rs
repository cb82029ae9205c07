//! Error types for adversarial training.

use tabgan_core::CoreError;
use tabgan_stages::StageError;
use thiserror::Error;

/// Errors that can occur while building or running a trainer.
#[derive(Debug, Error)]
pub enum TrainError {
    /// The regimen ran out of resets without reaching its target.
    #[error("discriminator did not converge")]
    NotConverged,

    /// Models, connector or regimen disagree or are misconfigured.
    #[error("Invalid training configuration: {reason}")]
    Configuration { reason: String },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TrainError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

impl From<candle_core::Error> for TrainError {
    fn from(err: candle_core::Error) -> Self {
        Self::Core(CoreError::from(err))
    }
}
