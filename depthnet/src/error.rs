use resnet::ResNetError;
use thiserror::Error;

/// The error type for `DepthNet-Burn` operations.
///
/// Every failure is fatal: construction errors surface before any tensor is allocated
/// for the offending part, forward errors before any computation runs.
#[derive(Error, Debug)]
pub enum DepthNetError {
    /// Error for when an invalid model configuration is provided.
    /// The reason names the offending value.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when loading pretrained backbone weights fails.
    #[error("Failed to load weights: {reason}")]
    WeightLoading {
        /// The reason for the weight loading failure.
        reason: String,
    },
}

impl From<ResNetError> for DepthNetError {
    fn from(err: ResNetError) -> Self {
        match err {
            ResNetError::UnsupportedDepth { .. } => Self::InvalidConfiguration {
                reason: err.to_string(),
            },
            ResNetError::WeightLoading { reason } => Self::WeightLoading { reason },
        }
    }
}

/// A specialized `Result` type for `DepthNet-Burn` operations.
pub type DepthNetResult<T> = Result<T, DepthNetError>;
