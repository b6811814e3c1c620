//! Weight initialization for layers the network adds on top of the backbone.
//!
//! Convolutions draw weights from `Normal(0, sqrt(2 / n))` where `n` is
//! `kernel_h * kernel_w * out_channels` (or `* in_channels` for transposed convolutions),
//! biases start at zero, batch norm starts as the identity (scale 1, shift 0).
//! Pretrained backbone layers never go through these helpers.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, Initializer,
    },
    prelude::*,
};

/// The kinds of layer the policy knows how to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Conv2d {
        kernel_size: [usize; 2],
        channels_out: usize,
    },
    ConvTranspose2d {
        kernel_size: [usize; 2],
        channels_in: usize,
    },
    BatchNorm {
        num_features: usize,
    },
}

/// Initializers for a layer's weight (or scale) and bias (or shift).
#[derive(Debug, Clone)]
pub struct InitRule {
    pub weight: Initializer,
    pub bias: Initializer,
}

impl LayerKind {
    pub fn rule(&self) -> InitRule {
        match *self {
            Self::Conv2d {
                kernel_size: [kh, kw],
                channels_out,
            } => normal_fan(kh * kw * channels_out),
            Self::ConvTranspose2d {
                kernel_size: [kh, kw],
                channels_in,
            } => normal_fan(kh * kw * channels_in),
            Self::BatchNorm { .. } => InitRule {
                weight: Initializer::Ones,
                bias: Initializer::Zeros,
            },
        }
    }
}

fn normal_fan(n: usize) -> InitRule {
    InitRule {
        weight: Initializer::Normal {
            mean: 0.0,
            std: (2.0 / n as f64).sqrt(),
        },
        bias: Initializer::Zeros,
    }
}

/// Build a convolution with policy weights and a zeroed bias (when it has one).
pub fn conv2d<B: Backend>(config: Conv2dConfig, device: &Device<B>) -> Conv2d<B> {
    let channels_out = config.channels[1];
    let rule = LayerKind::Conv2d {
        kernel_size: config.kernel_size,
        channels_out,
    }
    .rule();

    let mut conv = config.with_initializer(rule.weight).init(device);
    conv.bias = conv.bias.map(|_| rule.bias.init([channels_out], device));
    conv
}

/// Build a transposed convolution with policy weights and a zeroed bias (when it has one).
pub fn conv_transpose2d<B: Backend>(
    config: ConvTranspose2dConfig,
    device: &Device<B>,
) -> ConvTranspose2d<B> {
    let [channels_in, channels_out] = config.channels;
    let rule = LayerKind::ConvTranspose2d {
        kernel_size: config.kernel_size,
        channels_in,
    }
    .rule();

    let mut conv = config.with_initializer(rule.weight).init(device);
    conv.bias = conv.bias.map(|_| rule.bias.init([channels_out], device));
    conv
}

pub fn batch_norm<B: Backend>(num_features: usize, device: &Device<B>) -> BatchNorm<B, 2> {
    let rule = LayerKind::BatchNorm { num_features }.rule();

    let mut bn = BatchNormConfig::new(num_features).init(device);
    bn.gamma = rule.weight.init([num_features], device);
    bn.beta = rule.bias.init([num_features], device);
    bn
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, nn::PaddingConfig2d, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    fn mean_and_std<const D: usize>(tensor: Tensor<TestBackend, D>) -> (f32, f32) {
        let mean = tensor.clone().mean().into_scalar();
        let var = (tensor - mean).powf_scalar(2.0).mean().into_scalar();
        (mean, var.sqrt())
    }

    #[test]
    fn conv_weights_follow_fan_out_normal() {
        let device = Default::default();
        let config =
            Conv2dConfig::new([64, 16], [3, 3]).with_padding(PaddingConfig2d::Explicit(1, 1));

        let conv = conv2d::<TestBackend>(config, &device);

        let expected_std = (2.0f32 / (3.0 * 3.0 * 16.0)).sqrt();
        let (mean, std) = mean_and_std(conv.weight.val());
        assert!(mean.abs() < 0.01, "mean {mean}");
        assert!(
            (std - expected_std).abs() < 0.1 * expected_std,
            "std {std}, expected {expected_std}"
        );

        let bias = conv.bias.expect("Conv2dConfig defaults to a bias").val();
        bias.into_data().assert_eq(&TensorData::from([0.0f32; 16]), false);
    }

    #[test]
    fn conv_without_bias_stays_without_bias() {
        let device = Default::default();
        let config = Conv2dConfig::new([8, 4], [1, 1]).with_bias(false);

        assert!(conv2d::<TestBackend>(config, &device).bias.is_none());
    }

    #[test]
    fn transposed_conv_uses_input_channels_for_fan() {
        let device = Default::default();
        let config = ConvTranspose2dConfig::new([32, 64], [4, 4]);

        let conv = conv_transpose2d::<TestBackend>(config, &device);

        let expected_std = (2.0f32 / (4.0 * 4.0 * 32.0)).sqrt();
        let (_, std) = mean_and_std(conv.weight.val());
        assert!((std - expected_std).abs() < 0.1 * expected_std);
    }

    #[test]
    fn batch_norm_starts_as_identity() {
        let device = Default::default();
        let bn = batch_norm::<TestBackend>(5, &device);

        bn.gamma
            .val()
            .into_data()
            .assert_eq(&TensorData::from([1.0f32; 5]), false);
        bn.beta
            .val()
            .into_data()
            .assert_eq(&TensorData::from([0.0f32; 5]), false);
    }

    #[test]
    fn rules_match_layer_kind() {
        let rule = LayerKind::Conv2d {
            kernel_size: [5, 5],
            channels_out: 8,
        }
        .rule();
        match rule.weight {
            Initializer::Normal { mean, std } => {
                assert_eq!(mean, 0.0);
                assert!((std - (2.0f64 / 200.0).sqrt()).abs() < 1e-12);
            }
            other => panic!("Expected a normal initializer, got {other:?}"),
        }
        assert!(matches!(rule.bias, Initializer::Zeros));
    }
}
