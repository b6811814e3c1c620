//! # DepthNet-Burn
//!
//! Monocular depth estimation with a ResNet encoder and a choice of upsampling decoders.
//!
//! ```ignore
//! let device = Default::default();
//! let model = depthnet_burn::construct_network::<B>(50, "upproj", [228, 304], 3, false, &device)?;
//! let depth = model.forward(images)?;
//! ```

mod config;
mod error;
pub mod init;
pub mod losses;
mod models;
mod sid;


use burn::prelude::*;

pub use config::{DecoderKind, ResizeMode, DECODER_CHANNEL_DIVISOR, DECODER_STAGES};
pub use error::{DepthNetError, DepthNetResult};
pub use models::{
    decoder::{
        DeConvStage, FasterUpConvBlock, FasterUpConvStage, FasterUpProjStage, PaddedConv,
        UpConvStage, UpProjStage,
    },
    Decoder, DecoderConfig, DecoderStage, DepthHead, DepthNet, DepthNetConfig, DepthNetRecord,
    EncoderFeatures, GroupedGradients, ParameterGroup, ResNetEncoder, Upsample,
    BACKBONE_LR_MULTIPLIER, NEW_LR_MULTIPLIER,
};
pub use resnet::{PretrainedProvider, RandomInit, ResNetDepth};
#[cfg(feature = "pretrained")]
pub use resnet::TorchvisionWeights;
pub use sid::{Sid, SidConfig};

/// Builds the decoder named `name` for `in_channels` input channels.
///
/// Accepted names are `deconv2` through `deconv9`, `upconv`, `upproj` and `fasterupproj`.
///
/// # Errors
///
/// Returns `InvalidConfiguration` for an unknown or malformed name, or a channel count
/// that is not a positive multiple of 16.
pub fn construct_decoder<B: Backend>(
    name: &str,
    in_channels: usize,
    device: &Device<B>,
) -> DepthNetResult<Decoder<B>> {
    let kind: DecoderKind = name.parse()?;
    DecoderConfig::new(kind, in_channels).init(device)
}

/// Builds a full network from its usual knobs.
///
/// # Errors
///
/// Returns `InvalidConfiguration` for an unsupported depth, an unknown decoder name, an
/// empty output size or zero input channels, and `WeightLoading` when pretrained weights
/// cannot be read.
pub fn construct_network<B: Backend>(
    depth: usize,
    decoder_name: &str,
    output_size: [usize; 2],
    in_channels: usize,
    use_pretrained: bool,
    device: &Device<B>,
) -> DepthNetResult<DepthNet<B>> {
    DepthNetConfig::new()
        .with_depth(depth)
        .with_decoder(decoder_name.parse()?)
        .with_output_size(output_size)
        .with_in_channels(in_channels)
        .with_pretrained(use_pretrained)
        .init(device)
}
