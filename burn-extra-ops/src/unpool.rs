//! # Zero-Insertion Unpooling
//!
//! Upsamples a feature map by placing every input value at the top-left corner of
//! a `stride x stride` block and filling the rest of the block with zeros. This is
//! the inverse of a max-pool that always selects the first position.

use burn::{
    prelude::*,
    tensor::{module::conv_transpose2d, ops::ConvTransposeOptions},
};

/// Configuration for the `Unpool` module.
#[derive(Config, Debug)]
pub struct UnpoolConfig {
    /// Number of channels of the input feature map.
    pub channels: usize,
    /// Upsampling factor applied to both spatial dimensions.
    #[config(default = "2")]
    pub stride: usize,
}

impl UnpoolConfig {
    /// Initializes a new `Unpool` module.
    pub const fn init(&self) -> Unpool {
        Unpool {
            channels: self.channels,
            stride: self.stride,
        }
    }
}

/// Fixed-weight unpooling layer.
///
/// Implemented as a grouped transposed convolution (one group per channel) whose
/// kernel is an impulse at `(0, 0)`. The kernel is rebuilt on every call, so the
/// module holds no parameters.
///
/// # Shapes
///   - input: `[batch_size, channels, height, width]`
///   - output: `[batch_size, channels, height * stride, width * stride]`
#[derive(Module, Clone, Debug)]
pub struct Unpool {
    channels: usize,
    stride: usize,
}

impl Unpool {
    /// Number of channels this layer was built for.
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial upsampling factor.
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Applies the unpooling to the input tensor.
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = input.dims();
        assert_eq!(
            channels, self.channels,
            "Unpool expects {} channels, got {channels}",
            self.channels
        );

        unpool(input, self.stride)
    }
}

/// Functional form of [`Unpool`].
pub fn unpool<B: Backend>(input: Tensor<B, 4>, stride: usize) -> Tensor<B, 4> {
    assert!(stride > 0, "Unpool stride must be positive");

    let device = input.device();
    let [_, channels, _, _] = input.dims();

    let impulse = Tensor::<B, 4>::ones([channels, 1, 1, 1], &device);
    let weight = Tensor::<B, 4>::zeros([channels, 1, stride, stride], &device)
        .slice_assign([0..channels, 0..1, 0..1, 0..1], impulse);

    conv_transpose2d(
        input,
        weight,
        None,
        ConvTransposeOptions::new([stride, stride], [0, 0], [0, 0], [1, 1], channels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn unpool_places_values_on_block_corners() {
        let device = Default::default();
        let unpool = UnpoolConfig::new(1).init();
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);

        let output = unpool.forward(input);

        assert_eq!(output.dims(), [1, 1, 4, 4]);
        output.into_data().assert_eq(
            &TensorData::from([[[
                [1.0f32, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
            ]]]),
            false,
        );
    }

    #[test]
    fn unpool_keeps_channels_independent() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::from_floats([[[[1.0]], [[2.0]], [[3.0]]]], &device);

        let output = unpool(input, 3);

        assert_eq!(output.dims(), [1, 3, 3, 3]);
        let values = output.into_data().to_vec::<f32>().unwrap();
        for (channel, expected) in [1.0f32, 2.0, 3.0].into_iter().enumerate() {
            let block = &values[channel * 9..(channel + 1) * 9];
            assert_eq!(block[0], expected);
            assert!(block[1..].iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    #[should_panic(expected = "Unpool expects 4 channels")]
    fn unpool_rejects_wrong_channel_count() {
        let device = Default::default();
        let unpool = UnpoolConfig::new(4).init();
        let _ = unpool.forward(Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device));
    }
}
