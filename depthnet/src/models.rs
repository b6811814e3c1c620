//! # Model Architectures
//!
//! - `decoder`: the four-stage upsampling decoders and their stages.
//! - `encoder`: the ResNet encoder built from a pretrained-model provider.
//! - `depthnet`: the full network and its parameter groups.

pub mod decoder;
pub mod depthnet;
pub mod encoder;

pub use decoder::{Decoder, DecoderConfig, DecoderStage, Upsample};
pub use depthnet::{
    DepthHead, DepthNet, DepthNetConfig, DepthNetRecord, GroupedGradients, ParameterGroup,
    BACKBONE_LR_MULTIPLIER, NEW_LR_MULTIPLIER,
};
pub use encoder::{EncoderFeatures, ResNetEncoder};
