use burn::{
    nn::{conv::ConvTranspose2d, conv::ConvTranspose2dConfig, BatchNorm, Relu},
    prelude::*,
};

use super::Upsample;
use crate::{
    config::{deconv_padding, DecoderKind},
    error::DepthNetResult,
    init,
};

/// Stride-2 transposed convolution, batch norm, ReLU.
#[derive(Module, Debug)]
pub struct DeConvStage<B: Backend> {
    deconv: ConvTranspose2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> DeConvStage<B> {
    pub fn new(in_channels: usize, kernel_size: usize, device: &Device<B>) -> DepthNetResult<Self> {
        DecoderKind::DeConv(kernel_size).validate()?;

        let out_channels = in_channels / 2;
        let (padding, output_padding) = deconv_padding(kernel_size);
        let deconv = init::conv_transpose2d(
            ConvTranspose2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
                .with_stride([2, 2])
                .with_padding([padding, padding])
                .with_padding_out([output_padding, output_padding])
                .with_bias(false),
            device,
        );

        Ok(Self {
            deconv,
            bn: init::batch_norm(out_channels, device),
            relu: Relu::new(),
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.deconv.weight.dims()[2]
    }
}

impl<B: Backend> Upsample<B> for DeConvStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.deconv.forward(input);
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }
}
