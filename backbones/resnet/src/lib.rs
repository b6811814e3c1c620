//! ResNet classifiers for the depth-estimation encoder.
//!
//! The architecture mirrors torchvision's `ResNet`: a stem (7x7 conv, batch norm, ReLU,
//! 3x3 max-pool), four residual stages and a classification head. The head is kept so
//! that full torchvision checkpoints can be loaded; encoders discard it afterwards.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;

mod blocks;
mod error;
mod pretrained;

pub use blocks::*;
pub use error::{ResNetError, ResNetResult};
pub use pretrained::{PretrainedProvider, RandomInit};
#[cfg(feature = "pretrained")]
pub use pretrained::TorchvisionWeights;

/// Width of the stem convolution and of the first residual stage.
pub const STEM_CHANNELS: usize = 64;

/// Number of ImageNet classes predicted by the torchvision head.
pub const IMAGENET_CLASSES: usize = 1000;

/// The five ResNet depths torchvision publishes weights for.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum ResNetDepth {
    ResNet18,
    ResNet34,
    ResNet50,
    ResNet101,
    ResNet152,
}

impl ResNetDepth {
    /// Residual blocks per stage.
    pub const fn blocks(&self) -> [usize; 4] {
        match self {
            Self::ResNet18 => [2, 2, 2, 2],
            Self::ResNet34 | Self::ResNet50 => [3, 4, 6, 3],
            Self::ResNet101 => [3, 4, 23, 3],
            Self::ResNet152 => [3, 8, 36, 3],
        }
    }

    /// Whether stages are built from bottleneck blocks rather than basic blocks.
    pub const fn is_bottleneck(&self) -> bool {
        !matches!(self, Self::ResNet18 | Self::ResNet34)
    }

    /// Channel multiplier applied to every stage width.
    pub const fn expansion(&self) -> usize {
        if self.is_bottleneck() {
            BOTTLENECK_EXPANSION
        } else {
            1
        }
    }

    /// Output channels of the four stages.
    pub const fn stage_channels(&self) -> [usize; 4] {
        let e = self.expansion();
        [64 * e, 128 * e, 256 * e, 512 * e]
    }

    /// Output channels of the deepest stage.
    pub const fn out_channels(&self) -> usize {
        self.stage_channels()[3]
    }

    /// Model name as used by torchvision, e.g. `resnet50`.
    pub fn name(&self) -> String {
        format!("resnet{}", self.layers())
    }

    /// Number of layers, as in the model name.
    pub const fn layers(&self) -> usize {
        match self {
            Self::ResNet18 => 18,
            Self::ResNet34 => 34,
            Self::ResNet50 => 50,
            Self::ResNet101 => 101,
            Self::ResNet152 => 152,
        }
    }
}

impl TryFrom<usize> for ResNetDepth {
    type Error = ResNetError;

    fn try_from(depth: usize) -> ResNetResult<Self> {
        match depth {
            18 => Ok(Self::ResNet18),
            34 => Ok(Self::ResNet34),
            50 => Ok(Self::ResNet50),
            101 => Ok(Self::ResNet101),
            152 => Ok(Self::ResNet152),
            _ => Err(ResNetError::UnsupportedDepth { depth }),
        }
    }
}

/// Stem: conv1 + bn1 + relu + maxpool.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        self.maxpool.forward(out)
    }

    /// Create a stem with torchvision's random initialization.
    pub fn new(in_channels: usize, device: &Device<B>) -> Self {
        let conv1 = Self::conv1_config(in_channels)
            .with_initializer(kaiming_fan_out())
            .init(device);
        let bn1 = BatchNormConfig::new(STEM_CHANNELS).init(device);

        Self::from_layers(conv1, bn1)
    }

    /// Create a stem around externally built conv1 and bn1 layers.
    pub fn from_layers(conv1: Conv2d<B>, bn1: BatchNorm<B, 2>) -> Self {
        // 3x3 maxpool, stride=2, padding=1
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self {
            conv1,
            bn1,
            relu: Relu::new(),
            maxpool,
        }
    }

    /// The 7x7, stride 2, padding 3, bias-free convolution of the stem.
    pub fn conv1_config(in_channels: usize) -> Conv2dConfig {
        Conv2dConfig::new([in_channels, STEM_CHANNELS], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
    }

    /// Number of input channels conv1 consumes.
    pub fn in_channels(&self) -> usize {
        self.conv1.weight.dims()[1]
    }
}

/// Global average pooling followed by the fully connected classifier.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    avgpool: AdaptiveAvgPool2d,
    pub fc: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.avgpool.forward(input);
        self.fc.forward(pooled.flatten(1, 3))
    }

    pub fn new(in_features: usize, num_classes: usize, device: &Device<B>) -> Self {
        Self {
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(in_features, num_classes).init(device),
        }
    }
}

/// Multi-scale features produced by the four residual stages.
#[derive(Debug, Clone)]
pub struct ResNetOutput<B: Backend> {
    /// Layer1 output (1/4 scale)
    pub layer1: Tensor<B, 4>,
    /// Layer2 output (1/8 scale)
    pub layer2: Tensor<B, 4>,
    /// Layer3 output (1/16 scale)
    pub layer3: Tensor<B, 4>,
    /// Layer4 output (1/32 scale)
    pub layer4: Tensor<B, 4>,
}

/// torchvision-compatible ResNet classifier.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub stem: Stem<B>,
    pub layer1: LayerBlock<B>,
    pub layer2: LayerBlock<B>,
    pub layer3: LayerBlock<B>,
    pub layer4: LayerBlock<B>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> ResNet<B> {
    /// Create a randomly initialized ResNet of the given depth for 3-channel input.
    pub fn new(depth: ResNetDepth, device: &Device<B>) -> Self {
        let [c1, c2, c3, c4] = depth.stage_channels();
        let [n1, n2, n3, n4] = depth.blocks();
        let bottleneck = depth.is_bottleneck();

        Self {
            stem: Stem::new(3, device),
            layer1: LayerBlock::new(n1, STEM_CHANNELS, c1, 1, bottleneck, device),
            layer2: LayerBlock::new(n2, c1, c2, 2, bottleneck, device),
            layer3: LayerBlock::new(n3, c2, c3, 2, bottleneck, device),
            layer4: LayerBlock::new(n4, c3, c4, 2, bottleneck, device),
            head: ClassifierHead::new(c4, IMAGENET_CLASSES, device),
        }
    }

    /// Run the stem and the four stages.
    pub fn forward_features(&self, input: Tensor<B, 4>) -> ResNetOutput<B> {
        let x = self.stem.forward(input);
        let layer1 = self.layer1.forward(x);
        let layer2 = self.layer2.forward(layer1.clone());
        let layer3 = self.layer3.forward(layer2.clone());
        let layer4 = self.layer4.forward(layer3.clone());

        ResNetOutput {
            layer1,
            layer2,
            layer3,
            layer4,
        }
    }

    /// Class logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(input);
        self.head.forward(features.layer4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_depth_parsing() {
        assert_eq!(ResNetDepth::try_from(50).unwrap(), ResNetDepth::ResNet50);
        assert_eq!(ResNetDepth::ResNet101.name(), "resnet101");

        match ResNetDepth::try_from(200) {
            Err(ResNetError::UnsupportedDepth { depth }) => assert_eq!(depth, 200),
            other => panic!("Expected UnsupportedDepth error, got {other:?}"),
        }
    }

    #[test]
    fn test_stage_channels() {
        assert_eq!(ResNetDepth::ResNet34.stage_channels(), [64, 128, 256, 512]);
        assert_eq!(ResNetDepth::ResNet152.out_channels(), 2048);
        assert_eq!(ResNetDepth::ResNet101.blocks(), [3, 4, 23, 3]);
    }

    #[test]
    fn test_resnet18_forward() {
        let device = Default::default();
        let model = ResNet::<TestBackend>::new(ResNetDepth::ResNet18, &device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward_features(input.clone());

        // Check output shapes for ResNet18 (expansion=1)
        assert_eq!(output.layer1.dims(), [1, 64, 16, 16]);
        assert_eq!(output.layer2.dims(), [1, 128, 8, 8]);
        assert_eq!(output.layer3.dims(), [1, 256, 4, 4]);
        assert_eq!(output.layer4.dims(), [1, 512, 2, 2]);

        assert_eq!(model.forward(input).dims(), [1, IMAGENET_CLASSES]);
    }

    #[test]
    fn test_resnet50_forward() {
        let device = Default::default();
        let model = ResNet::<TestBackend>::new(ResNetDepth::ResNet50, &device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward_features(input);

        assert_eq!(output.layer1.dims(), [1, 256, 16, 16]);
        assert_eq!(output.layer4.dims(), [1, 2048, 2, 2]);
        assert_eq!(model.stem.in_channels(), 3);
    }
}
