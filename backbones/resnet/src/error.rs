use thiserror::Error;

/// Errors raised while building or loading a ResNet.
#[derive(Error, Debug)]
pub enum ResNetError {
    /// The requested depth has no torchvision counterpart.
    #[error("Only 18, 34, 50, 101, and 152 layer models are defined for ResNet, got {depth}")]
    UnsupportedDepth {
        /// The rejected depth.
        depth: usize,
    },

    /// Pretrained weights could not be read.
    #[error("Failed to load ResNet weights: {reason}")]
    WeightLoading {
        /// What went wrong, including the file involved.
        reason: String,
    },
}

/// A specialized `Result` type for ResNet operations.
pub type ResNetResult<T> = Result<T, ResNetError>;
