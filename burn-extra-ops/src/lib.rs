//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in deep learning but are not
//! yet available in the core Burn framework.

use burn::prelude::*;

mod pixel_shuffle;
mod unpool;

// Convenient re-exports
pub use pixel_shuffle::{pixel_shuffle, PixelShuffle, PixelShuffleConfig};
pub use unpool::{unpool, Unpool, UnpoolConfig};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend> {
    /// Zero-insertion upsampling by `stride` along both spatial dimensions.
    fn unpool(self, stride: usize) -> Self;

    /// Channel-to-space rearrangement by `upscale_factor`.
    fn pixel_shuffle(self, upscale_factor: usize) -> Self;
}

impl<B: Backend> TensorExtraOps<B> for Tensor<B, 4> {
    fn unpool(self, stride: usize) -> Self {
        unpool(self, stride)
    }

    fn pixel_shuffle(self, upscale_factor: usize) -> Self {
        pixel_shuffle(self, upscale_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::Tensor,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_tensor_extra_ops() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::random(
            [2, 8, 3, 5],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        assert_eq!(tensor.clone().unpool(2).dims(), [2, 8, 6, 10]);
        assert_eq!(tensor.pixel_shuffle(2).dims(), [2, 2, 6, 10]);
    }

    #[test]
    fn unpool_then_shuffle_preserves_sum() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::random(
            [1, 4, 2, 2],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let expected = tensor.clone().sum().into_scalar();

        let actual = tensor.unpool(2).pixel_shuffle(2).sum().into_scalar();

        assert!((expected - actual).abs() < 1e-4);
    }
}
