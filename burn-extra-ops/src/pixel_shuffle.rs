//! # Pixel Shuffle
//!
//! Channel-to-space rearrangement with PyTorch `nn.PixelShuffle` semantics.

use burn::prelude::*;

/// Configuration for the `PixelShuffle` module.
#[derive(Config, Debug)]
pub struct PixelShuffleConfig {
    /// Factor by which both spatial dimensions are multiplied.
    #[config(default = "2")]
    pub upscale_factor: usize,
}

impl PixelShuffleConfig {
    /// Initializes a new `PixelShuffle` module.
    pub const fn init(&self) -> PixelShuffle {
        PixelShuffle {
            upscale_factor: self.upscale_factor,
        }
    }
}

/// Rearranges `[b, c * r * r, h, w]` into `[b, c, h * r, w * r]`.
///
/// Output element `[n, c, h * r + i, w * r + j]` is taken from input element
/// `[n, c * r * r + i * r + j, h, w]`.
#[derive(Module, Clone, Debug)]
pub struct PixelShuffle {
    upscale_factor: usize,
}

impl PixelShuffle {
    /// Applies the rearrangement.
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        pixel_shuffle(input, self.upscale_factor)
    }
}

/// Functional form of [`PixelShuffle`].
pub fn pixel_shuffle<B: Backend>(input: Tensor<B, 4>, upscale_factor: usize) -> Tensor<B, 4> {
    let r = upscale_factor;
    let [batch_size, channels, height, width] = input.dims();
    assert!(
        r > 0 && channels % (r * r) == 0,
        "PixelShuffle needs channels divisible by {}, got {channels}",
        r * r
    );
    let out_channels = channels / (r * r);

    input
        .reshape([batch_size, out_channels, r, r, height, width])
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([batch_size, out_channels, height * r, width * r])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn pixel_shuffle_moves_channels_into_space() {
        let device = Default::default();
        let input =
            Tensor::<TestBackend, 4>::from_floats([[[[0.0]], [[1.0]], [[2.0]], [[3.0]]]], &device);

        let output = PixelShuffleConfig::new().init().forward(input);

        output
            .into_data()
            .assert_eq(&TensorData::from([[[[0.0f32, 1.0], [2.0, 3.0]]]]), false);
    }

    #[test]
    fn pixel_shuffle_matches_index_mapping() {
        let device = Default::default();
        let (r, c, h, w) = (2, 3, 2, 3);
        let input = Tensor::<TestBackend, 1, Int>::arange(0..(c * r * r * h * w) as i64, &device)
            .float()
            .reshape([1, c * r * r, h, w]);
        let source = input.to_data().to_vec::<f32>().unwrap();

        let output = pixel_shuffle(input, r);

        assert_eq!(output.dims(), [1, c, h * r, w * r]);
        let shuffled = output.into_data().to_vec::<f32>().unwrap();
        for ch in 0..c {
            for y in 0..h * r {
                for x in 0..w * r {
                    let (i, j) = (y % r, x % r);
                    let src_channel = ch * r * r + i * r + j;
                    let src = source[(src_channel * h + y / r) * w + x / r];
                    let dst = shuffled[(ch * h * r + y) * w * r + x];
                    assert_eq!(dst, src, "mismatch at channel {ch}, ({y}, {x})");
                }
            }
        }
    }

    #[test]
    #[should_panic(expected = "PixelShuffle needs channels divisible by 4")]
    fn pixel_shuffle_rejects_indivisible_channels() {
        let device = Default::default();
        let _ = pixel_shuffle(Tensor::<TestBackend, 4>::ones([1, 6, 2, 2], &device), 2);
    }
}
