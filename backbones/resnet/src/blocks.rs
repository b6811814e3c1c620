//! ResNet block implementations.
//!
//! Residual blocks follow the torchvision layout and field names (`conv1`, `bn1`, ...,
//! `downsample`) so that torchvision checkpoints map onto them key by key.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Channel expansion of the bottleneck block's last 1x1 convolution.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// torchvision initializes every residual convolution with Kaiming normal over fan-out.
pub(crate) fn kaiming_fan_out() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    }
}

/// Bias-free convolution followed by batch norm, the unit every block is built from.
fn conv_bn<B: Backend>(
    channels: [usize; 2],
    kernel: usize,
    stride: usize,
    device: &Device<B>,
) -> (Conv2d<B>, BatchNorm<B, 2>) {
    let padding = kernel / 2;
    let conv = Conv2dConfig::new(channels, [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .with_initializer(kaiming_fan_out())
        .init(device);
    let bn = BatchNormConfig::new(channels[1]).init(device);

    (conv, bn)
}

#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    /// A bottleneck residual block.
    Bottleneck(Bottleneck<B>),
    /// A basic residual block.
    Basic(BasicBlock<B>),
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }
}

/// Two 3x3 convolutions with an identity (or projected) shortcut.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    pub(crate) bn1: BatchNorm<B, 2>,
    pub(crate) conv2: Conv2d<B>,
    pub(crate) bn2: BatchNorm<B, 2>,
    pub(crate) downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(input)));
        let out = self.bn2.forward(self.conv2.forward(out));

        self.relu.forward(out + shortcut)
    }

    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        let (conv1, bn1) = conv_bn([in_channels, out_channels], 3, stride, device);
        let (conv2, bn2) = conv_bn([out_channels, out_channels], 3, 1, device);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample: Downsample::when_needed(in_channels, out_channels, stride, device),
            relu: Relu::new(),
        }
    }
}

/// 1x1 -> 3x3 -> 1x1 bottleneck with the stride on the 3x3 convolution (ResNet V1.5).
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    pub(crate) bn1: BatchNorm<B, 2>,
    pub(crate) conv2: Conv2d<B>,
    pub(crate) bn2: BatchNorm<B, 2>,
    pub(crate) conv3: Conv2d<B>,
    pub(crate) bn3: BatchNorm<B, 2>,
    pub(crate) downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(input)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + shortcut)
    }

    /// `out_channels` is the expanded width; the inner width is a quarter of it.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        let width = out_channels / BOTTLENECK_EXPANSION;
        let (conv1, bn1) = conv_bn([in_channels, width], 1, 1, device);
        let (conv2, bn2) = conv_bn([width, width], 3, stride, device);
        let (conv3, bn3) = conv_bn([width, out_channels], 1, 1, device);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            downsample: Downsample::when_needed(in_channels, out_channels, stride, device),
            relu: Relu::new(),
        }
    }
}

/// Strided 1x1 projection used on the shortcut when the block changes shape.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    pub(crate) bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }

    fn when_needed(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &Device<B>,
    ) -> Option<Self> {
        (stride != 1 || in_channels != out_channels).then(|| {
            let (conv, bn) = conv_bn([in_channels, out_channels], 1, stride, device);
            Self { conv, bn }
        })
    }
}

/// One ResNet stage: a stack of residual blocks where only the first one strides.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    pub(crate) blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(input, |out, block| block.forward(out))
    }

    pub fn new(
        num_blocks: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        bottleneck: bool,
        device: &Device<B>,
    ) -> Self {
        let blocks = (0..num_blocks)
            .map(|index| {
                let (block_in, block_stride) = if index == 0 {
                    (in_channels, stride)
                } else {
                    (out_channels, 1)
                };

                if bottleneck {
                    ResidualBlock::Bottleneck(Bottleneck::new(
                        block_in,
                        out_channels,
                        block_stride,
                        device,
                    ))
                } else {
                    ResidualBlock::Basic(BasicBlock::new(
                        block_in,
                        out_channels,
                        block_stride,
                        device,
                    ))
                }
            })
            .collect();

        Self { blocks }
    }

    /// Number of residual blocks in this stage.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn basic_block_projects_shortcut_when_striding() {
        let device = Default::default();
        let block = BasicBlock::<TestBackend>::new(16, 32, 2, &device);
        assert!(block.downsample.is_some());

        let out = block.forward(Tensor::zeros([1, 16, 8, 8], &device));
        assert_eq!(out.dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn bottleneck_keeps_identity_shortcut_when_shape_is_unchanged() {
        let device = Default::default();
        let block = Bottleneck::<TestBackend>::new(64, 64, 1, &device);
        assert!(block.downsample.is_none());

        let out = block.forward(Tensor::ones([2, 64, 5, 5], &device));
        assert_eq!(out.dims(), [2, 64, 5, 5]);
    }

    #[test]
    fn layer_block_only_first_block_strides() {
        let device = Default::default();
        let layer = LayerBlock::<TestBackend>::new(3, 8, 16, 2, false, &device);
        assert_eq!(layer.len(), 3);

        let out = layer.forward(Tensor::zeros([1, 8, 6, 6], &device));
        assert_eq!(out.dims(), [1, 16, 3, 3]);
    }
}
