//! # DepthNet Model Implementation
//!
//! A ResNet encoder followed by a channel reduction, one of the upsampling decoders, a
//! single-channel projection and a resize to a fixed output size.
//!
//! ## Core Components
//!
//! - `DepthNetConfig`: configuration used to build the network.
//! - `DepthNet`: the network, with the backbone/new parameter split used to train the
//!   layers it adds ten times faster than the pretrained ones.
//! - `DepthHead`: every layer added on top of the backbone.

use std::collections::HashSet;

use burn::{
    module::{Ignored, ModuleVisitor, ParamId},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, PaddingConfig2d,
    },
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use resnet::{PretrainedProvider, RandomInit, ResNetDepth};

use super::{
    decoder::{Decoder, DecoderConfig},
    encoder::ResNetEncoder,
};
use crate::{
    config::{DecoderKind, ResizeMode},
    error::{DepthNetError, DepthNetResult},
    init,
};

/// Learning-rate multiplier of the pretrained encoder.
pub const BACKBONE_LR_MULTIPLIER: f64 = 1.0;

/// Learning-rate multiplier of every layer added on top of the encoder.
pub const NEW_LR_MULTIPLIER: f64 = 10.0;

/// Configuration for the `DepthNet` model.
#[derive(Config, Debug)]
pub struct DepthNetConfig {
    /// ResNet depth: 18, 34, 50, 101 or 152.
    #[config(default = "50")]
    pub depth: usize,
    /// Upsampling strategy of the decoder.
    #[config(default = "DecoderKind::UpProj")]
    pub decoder: DecoderKind,
    /// `[height, width]` of the predicted depth map.
    #[config(default = "[228, 304]")]
    pub output_size: [usize; 2],
    /// Channels of the input image.
    #[config(default = "3")]
    pub in_channels: usize,
    /// Start the encoder from torchvision ImageNet weights.
    #[config(default = "false")]
    pub pretrained: bool,
    /// Interpolation used for the final resize.
    #[config(default = "ResizeMode::Bilinear")]
    pub resize: ResizeMode,
}

impl DepthNetConfig {
    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an unsupported depth, an empty output size, zero
    /// input channels, an invalid decoder, or pretrained weights requested in a build
    /// without the `pretrained` feature.
    pub fn validate(&self) -> DepthNetResult<()> {
        let depth = self.resnet_depth()?;

        if self.in_channels == 0 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: "in_channels must be positive".to_string(),
            });
        }

        if self.output_size.contains(&0) {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!("output_size must be non-empty, got {:?}", self.output_size),
            });
        }

        if self.pretrained && !cfg!(feature = "pretrained") {
            return Err(DepthNetError::InvalidConfiguration {
                reason: "pretrained weights need the `pretrained` feature".to_string(),
            });
        }

        DecoderConfig::new(self.decoder.clone(), depth.out_channels() / 2).validate()
    }

    pub fn resnet_depth(&self) -> DepthNetResult<ResNetDepth> {
        Ok(ResNetDepth::try_from(self.depth)?)
    }

    /// Initializes a `DepthNet`, with torchvision weights when `pretrained` is set and
    /// freshly initialized ones otherwise.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<DepthNet<B>> {
        self.validate()?;

        if self.pretrained {
            self.init_pretrained(device)
        } else {
            self.init_with_provider(&RandomInit, device)
        }
    }

    #[cfg(feature = "pretrained")]
    fn init_pretrained<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<DepthNet<B>> {
        let weights = resnet::TorchvisionWeights::from_cache_dir()?;
        self.init_with_provider(&weights, device)
    }

    #[cfg(not(feature = "pretrained"))]
    fn init_pretrained<B: Backend>(&self, _device: &Device<B>) -> DepthNetResult<DepthNet<B>> {
        Err(DepthNetError::InvalidConfiguration {
            reason: "pretrained weights need the `pretrained` feature".to_string(),
        })
    }

    /// Initializes a `DepthNet` whose encoder comes from `provider`.
    pub fn init_with_provider<B: Backend, P: PretrainedProvider<B>>(
        &self,
        provider: &P,
        device: &Device<B>,
    ) -> DepthNetResult<DepthNet<B>> {
        self.validate()?;
        let depth = self.resnet_depth()?;

        let encoder = ResNetEncoder::new(depth, self.in_channels, provider, device)?;
        let head = DepthHead::new(encoder.out_channels(), &self.decoder, device)?;
        tracing::debug!(
            depth = self.depth,
            decoder = %self.decoder.name(),
            output_size = ?self.output_size,
            pretrained = provider.is_pretrained(),
            "built depth network"
        );

        Ok(DepthNet {
            encoder,
            head,
            output_size: Ignored(self.output_size),
            resize: Ignored(self.resize.clone()),
            in_channels: self.in_channels,
        })
    }
}

/// Layers added on top of the encoder: 1x1 reduction to half the channels, batch norm,
/// decoder, then a 3x3 projection to a single channel.
#[derive(Module, Debug)]
pub struct DepthHead<B: Backend> {
    reduce: Conv2d<B>,
    reduce_bn: BatchNorm<B, 2>,
    decoder: Decoder<B>,
    predict: Conv2d<B>,
}

impl<B: Backend> DepthHead<B> {
    fn new(
        encoder_channels: usize,
        kind: &DecoderKind,
        device: &Device<B>,
    ) -> DepthNetResult<Self> {
        let channels = encoder_channels / 2;
        let decoder = DecoderConfig::new(kind.clone(), channels).init(device)?;

        let reduce = init::conv2d(
            Conv2dConfig::new([encoder_channels, channels], [1, 1]).with_bias(false),
            device,
        );
        let predict = init::conv2d(
            Conv2dConfig::new([decoder.out_channels(), 1], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false),
            device,
        );

        Ok(Self {
            reduce,
            reduce_bn: init::batch_norm(channels, device),
            decoder,
            predict,
        })
    }

    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.reduce_bn.forward(self.reduce.forward(features));
        let x = self.decoder.forward(x);
        self.predict.forward(x)
    }
}

/// A named set of parameters trained with a multiple of the base learning rate.
#[derive(Debug, Clone)]
pub struct ParameterGroup {
    pub name: &'static str,
    pub lr_multiplier: f64,
    /// Base learning rate times `lr_multiplier`.
    pub learning_rate: f64,
    pub params: Vec<ParamId>,
}

/// Gradients of one backward pass, split by parameter group.
pub struct GroupedGradients {
    pub backbone: GradientsParams,
    pub new: GradientsParams,
}

#[derive(Module, Debug)]
pub struct DepthNet<B: Backend> {
    encoder: ResNetEncoder<B>,
    head: DepthHead<B>,
    output_size: Ignored<[usize; 2]>,
    resize: Ignored<ResizeMode>,
    in_channels: usize,
}

impl<B: Backend> DepthNet<B> {
    /// Predict a `[batch, 1, out_h, out_w]` depth map.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the input's channel count differs from the configured
    /// one or any other dimension is empty.
    pub fn forward(&self, input: Tensor<B, 4>) -> DepthNetResult<Tensor<B, 4>> {
        let dims = input.dims();
        let [batch, channels, height, width] = dims;
        if channels != self.in_channels || batch == 0 || height == 0 || width == 0 {
            return Err(DepthNetError::ShapeMismatch {
                expected: format!(
                    "[batch, {}, height, width] with non-zero sizes",
                    self.in_channels
                ),
                actual: format!("{dims:?}"),
            });
        }

        let features = self.encoder.forward(input);
        let x = self.head.forward(features.layer4);

        Ok(self.resize.resize(x, *self.output_size))
    }

    pub fn encoder(&self) -> &ResNetEncoder<B> {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder<B> {
        &self.head.decoder
    }

    pub fn output_size(&self) -> [usize; 2] {
        *self.output_size
    }

    pub const fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Trainable parameters of the stem and the four residual stages.
    pub fn backbone_parameters(&self) -> Vec<ParamId> {
        trainable_params(&self.encoder)
    }

    /// Trainable parameters of the reduction, decoder and projection layers.
    pub fn new_parameters(&self) -> Vec<ParamId> {
        trainable_params(&self.head)
    }

    /// The `backbone` (1x) and `new` (10x) groups for a base learning rate.
    pub fn parameter_groups(&self, base_lr: f64) -> Vec<ParameterGroup> {
        vec![
            ParameterGroup {
                name: "backbone",
                lr_multiplier: BACKBONE_LR_MULTIPLIER,
                learning_rate: base_lr * BACKBONE_LR_MULTIPLIER,
                params: self.backbone_parameters(),
            },
            ParameterGroup {
                name: "new",
                lr_multiplier: NEW_LR_MULTIPLIER,
                learning_rate: base_lr * NEW_LR_MULTIPLIER,
                params: self.new_parameters(),
            },
        ]
    }

    /// Stop tracking gradients in the encoder; its parameters leave the backbone group.
    pub fn freeze_backbone(mut self) -> Self {
        self.encoder = self.encoder.no_grad();
        self
    }
}

impl<B: AutodiffBackend> DepthNet<B> {
    /// Split the gradients of a backward pass into the two parameter groups.
    pub fn split_gradients(&self, mut grads: B::Gradients) -> GroupedGradients {
        GroupedGradients {
            backbone: GradientsParams::from_module(&mut grads, &self.encoder),
            new: GradientsParams::from_module(&mut grads, &self.head),
        }
    }

    /// One optimizer step per parameter group, each with its own learning rate.
    pub fn step<O: Optimizer<Self, B>>(
        self,
        optim: &mut O,
        base_lr: f64,
        grads: B::Gradients,
    ) -> Self {
        let GroupedGradients { backbone, new } = self.split_gradients(grads);

        let model = optim.step(base_lr * BACKBONE_LR_MULTIPLIER, self, backbone);
        optim.step(base_lr * NEW_LR_MULTIPLIER, model, new)
    }
}

/// Collects the ids of parameters that track gradients.
struct TrainableParams {
    ids: Vec<ParamId>,
    seen: HashSet<ParamId>,
}

impl<B: Backend> ModuleVisitor<B> for TrainableParams {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if tensor.is_require_grad() && self.seen.insert(id) {
            self.ids.push(id);
        }
    }
}

fn trainable_params<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamId> {
    let mut visitor = TrainableParams {
        ids: Vec::new(),
        seen: HashSet::new(),
    };
    module.visit(&mut visitor);
    visitor.ids
}
