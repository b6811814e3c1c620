use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::ElementConversion,
};
use burn_extra_ops::{PixelShuffle, PixelShuffleConfig, Unpool, UnpoolConfig};

use super::Upsample;
use crate::init;

/// Unpool, 5x5 convolution, batch norm, ReLU.
#[derive(Module, Debug)]
pub struct UpConvStage<B: Backend> {
    unpool: Unpool,
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> UpConvStage<B> {
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        let out_channels = in_channels / 2;
        let conv = init::conv2d(
            Conv2dConfig::new([in_channels, out_channels], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .with_bias(false),
            device,
        );

        Self {
            unpool: UnpoolConfig::new(in_channels).init(),
            conv,
            bn: init::batch_norm(out_channels, device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Upsample<B> for UpConvStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.unpool.forward(input);
        let x = self.bn.forward(self.conv.forward(x));
        self.relu.forward(x)
    }
}

/// Convolution + batch norm over an input zero-padded so that the output keeps the
/// input's spatial size.
///
/// Kernels are 2 or 3 wide per axis: a 3-wide axis is padded on both sides, a 2-wide
/// axis on the trailing side only.
#[derive(Module, Debug)]
pub struct PaddedConv<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> PaddedConv<B> {
    fn new(channels: [usize; 2], kernel_size: [usize; 2], device: &Device<B>) -> Self {
        Self {
            conv: init::conv2d(Conv2dConfig::new(channels, kernel_size), device),
            bn: init::batch_norm(channels[1], device),
        }
    }

    /// `(left, right, top, bottom)` zero padding applied before the convolution.
    pub fn padding(&self) -> (usize, usize, usize, usize) {
        let [_, _, kernel_h, kernel_w] = self.conv.weight.dims();
        (kernel_w - 2, 1, kernel_h - 2, 1)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let padded = input.pad(self.padding(), 0.0f32.elem::<B::FloatElem>());
        self.bn.forward(self.conv.forward(padded))
    }
}

/// Four padded convolutions (3x3, 2x3, 3x2, 2x2) concatenated on channels and
/// rearranged by a 2x pixel shuffle: `c` channels in, `c / 2` out, spatial size doubled.
#[derive(Module, Debug)]
pub struct FasterUpConvBlock<B: Backend> {
    branches: Vec<PaddedConv<B>>,
    shuffle: PixelShuffle,
}

impl<B: Backend> FasterUpConvBlock<B> {
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        let channels = [in_channels, in_channels / 2];
        let branches = [[3, 3], [2, 3], [3, 2], [2, 2]]
            .into_iter()
            .map(|kernel_size| PaddedConv::new(channels, kernel_size, device))
            .collect();

        Self {
            branches,
            shuffle: PixelShuffleConfig::new().with_upscale_factor(2).init(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let features = self
            .branches
            .iter()
            .map(|branch| branch.forward(input.clone()))
            .collect();

        self.shuffle.forward(Tensor::cat(features, 1))
    }
}

/// A [`FasterUpConvBlock`] followed by ReLU.
#[derive(Module, Debug)]
pub struct FasterUpConvStage<B: Backend> {
    block: FasterUpConvBlock<B>,
    relu: Relu,
}

impl<B: Backend> FasterUpConvStage<B> {
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        Self {
            block: FasterUpConvBlock::new(in_channels, device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Upsample<B> for FasterUpConvStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.block.forward(input))
    }
}
