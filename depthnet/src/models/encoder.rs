//! ResNet encoder: the classifier's stem and residual stages, without its head.

use burn::{module::Ignored, prelude::*};
use resnet::{LayerBlock, PretrainedProvider, ResNetDepth, Stem, STEM_CHANNELS};

use crate::{error::DepthNetResult, init};

/// Stem output and the outputs of the four residual stages.
#[derive(Debug, Clone)]
pub struct EncoderFeatures<B: Backend> {
    /// After conv1, bn1, relu and maxpool (1/4 scale)
    pub stem: Tensor<B, 4>,
    /// Layer1 output (1/4 scale)
    pub layer1: Tensor<B, 4>,
    /// Layer2 output (1/8 scale)
    pub layer2: Tensor<B, 4>,
    /// Layer3 output (1/16 scale)
    pub layer3: Tensor<B, 4>,
    /// Layer4 output (1/32 scale)
    pub layer4: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct ResNetEncoder<B: Backend> {
    stem: Stem<B>,
    layer1: LayerBlock<B>,
    layer2: LayerBlock<B>,
    layer3: LayerBlock<B>,
    layer4: LayerBlock<B>,
    depth: Ignored<ResNetDepth>,
}

impl<B: Backend> ResNetEncoder<B> {
    /// Take the stem and stages of the provider's ResNet.
    ///
    /// For an input channel count other than 3, conv1 and bn1 are rebuilt for that count
    /// and initialized like the rest of the new layers; every other weight is kept.
    pub fn new<P: PretrainedProvider<B>>(
        depth: ResNetDepth,
        in_channels: usize,
        provider: &P,
        device: &Device<B>,
    ) -> DepthNetResult<Self> {
        let resnet = provider.resnet(depth.clone(), device)?;

        let stem = if in_channels == resnet.stem.in_channels() {
            resnet.stem
        } else {
            if provider.is_pretrained() {
                tracing::warn!(
                    in_channels,
                    "replacing pretrained conv1 and bn1 with freshly initialized layers"
                );
            }
            Stem::from_layers(
                init::conv2d(Stem::<B>::conv1_config(in_channels), device),
                init::batch_norm(STEM_CHANNELS, device),
            )
        };
        tracing::debug!(model = %depth.name(), in_channels, "building encoder");

        Ok(Self {
            stem,
            layer1: resnet.layer1,
            layer2: resnet.layer2,
            layer3: resnet.layer3,
            layer4: resnet.layer4,
            depth: Ignored(depth),
        })
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> EncoderFeatures<B> {
        let stem = self.stem.forward(input);
        let layer1 = self.layer1.forward(stem.clone());
        let layer2 = self.layer2.forward(layer1.clone());
        let layer3 = self.layer3.forward(layer2.clone());
        let layer4 = self.layer4.forward(layer3.clone());

        EncoderFeatures {
            stem,
            layer1,
            layer2,
            layer3,
            layer4,
        }
    }

    pub fn depth(&self) -> &ResNetDepth {
        &self.depth
    }

    pub fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    /// Channels of the deepest feature map.
    pub fn out_channels(&self) -> usize {
        self.depth.out_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};
    use resnet::RandomInit;

    type TestBackend = NdArray<f32>;

    #[test]
    fn exposes_stem_and_four_stages() {
        let device = Default::default();
        let encoder =
            ResNetEncoder::<TestBackend>::new(ResNetDepth::ResNet18, 3, &RandomInit, &device)
                .unwrap();

        let features = encoder.forward(Tensor::ones([1, 3, 64, 96], &device));

        assert_eq!(features.stem.dims(), [1, 64, 16, 24]);
        assert_eq!(features.layer1.dims(), [1, 64, 16, 24]);
        assert_eq!(features.layer2.dims(), [1, 128, 8, 12]);
        assert_eq!(features.layer3.dims(), [1, 256, 4, 6]);
        assert_eq!(features.layer4.dims(), [1, 512, 2, 3]);
        assert_eq!(encoder.out_channels(), 512);
    }

    #[test]
    fn stem_is_rebuilt_for_other_channel_counts() {
        let device = Default::default();
        let encoder =
            ResNetEncoder::<TestBackend>::new(ResNetDepth::ResNet18, 4, &RandomInit, &device)
                .unwrap();
        assert_eq!(encoder.in_channels(), 4);

        let expected_std = (2.0f32 / (7.0 * 7.0 * 64.0)).sqrt();
        let weight = encoder.stem.conv1.weight.val();
        assert_eq!(weight.dims(), [64, 4, 7, 7]);
        let mean = weight.clone().mean().into_scalar();
        let std = (weight - mean).powf_scalar(2.0).mean().into_scalar().sqrt();
        assert!((std - expected_std).abs() < 0.1 * expected_std);

        encoder
            .stem
            .bn1
            .gamma
            .val()
            .into_data()
            .assert_eq(&TensorData::from([1.0f32; 64]), false);

        let features = encoder.forward(Tensor::ones([2, 4, 32, 32], &device));
        assert_eq!(features.layer4.dims(), [2, 512, 1, 1]);
    }
}
