use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, PaddingConfig2d, Relu,
    },
    prelude::*,
};
use burn_extra_ops::{Unpool, UnpoolConfig};

use super::{upconv::FasterUpConvBlock, Upsample};
use crate::init;

fn same_conv<B: Backend>(channels: [usize; 2], kernel: usize, device: &Device<B>) -> Conv2d<B> {
    let padding = kernel / 2;
    init::conv2d(
        Conv2dConfig::new(channels, [kernel, kernel])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false),
        device,
    )
}

/// Up-projection: unpool, then two branches summed and rectified.
///
/// - upper: 5x5 conv, BN, ReLU, 3x3 conv, BN
/// - bottom: 5x5 conv, BN
#[derive(Module, Debug)]
pub struct UpProjStage<B: Backend> {
    unpool: Unpool,
    upper_conv1: Conv2d<B>,
    upper_bn1: BatchNorm<B, 2>,
    upper_conv2: Conv2d<B>,
    upper_bn2: BatchNorm<B, 2>,
    bottom_conv: Conv2d<B>,
    bottom_bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> UpProjStage<B> {
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        let out_channels = in_channels / 2;

        Self {
            unpool: UnpoolConfig::new(in_channels).init(),
            upper_conv1: same_conv([in_channels, out_channels], 5, device),
            upper_bn1: init::batch_norm(out_channels, device),
            upper_conv2: same_conv([out_channels, out_channels], 3, device),
            upper_bn2: init::batch_norm(out_channels, device),
            bottom_conv: same_conv([in_channels, out_channels], 5, device),
            bottom_bn: init::batch_norm(out_channels, device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Upsample<B> for UpProjStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.unpool.forward(input);

        let upper = self.upper_conv1.forward(x.clone());
        let upper = self.relu.forward(self.upper_bn1.forward(upper));
        let upper = self.upper_bn2.forward(self.upper_conv2.forward(upper));

        let bottom = self.bottom_bn.forward(self.bottom_conv.forward(x));

        self.relu.forward(upper + bottom)
    }
}

/// Up-projection with pixel-shuffle blocks in place of unpool + 5x5 convolution.
///
/// - upper: block, ReLU, 3x3 conv, BN
/// - bottom: block
#[derive(Module, Debug)]
pub struct FasterUpProjStage<B: Backend> {
    upper_block: FasterUpConvBlock<B>,
    upper_conv: Conv2d<B>,
    upper_bn: BatchNorm<B, 2>,
    bottom_block: FasterUpConvBlock<B>,
    relu: Relu,
}

impl<B: Backend> FasterUpProjStage<B> {
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        let out_channels = in_channels / 2;

        Self {
            upper_block: FasterUpConvBlock::new(in_channels, device),
            upper_conv: same_conv([out_channels, out_channels], 3, device),
            upper_bn: init::batch_norm(out_channels, device),
            bottom_block: FasterUpConvBlock::new(in_channels, device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Upsample<B> for FasterUpProjStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let upper = self.relu.forward(self.upper_block.forward(input.clone()));
        let upper = self.upper_bn.forward(self.upper_conv.forward(upper));

        let bottom = self.bottom_block.forward(input);

        self.relu.forward(upper + bottom)
    }
}
