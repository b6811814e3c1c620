//! # Decoders
//!
//! Every decoder is four upsampling stages applied in sequence. Each stage halves the
//! channel count and doubles both spatial dimensions, so a decoder maps
//! `[b, c, h, w]` to `[b, c / 16, 16 h, 16 w]` whatever its kind.

mod deconv;
mod upconv;
mod upproj;

pub use deconv::DeConvStage;
pub use upconv::{FasterUpConvBlock, FasterUpConvStage, PaddedConv, UpConvStage};
pub use upproj::{FasterUpProjStage, UpProjStage};

use burn::{module::Ignored, prelude::*};

use crate::{
    config::{DecoderKind, DECODER_CHANNEL_DIVISOR, DECODER_STAGES},
    error::{DepthNetError, DepthNetResult},
};

/// One upsampling stage: `c` channels in, `c / 2` out, spatial size doubled.
pub trait Upsample<B: Backend> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// The stage types a decoder can be built from.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum DecoderStage<B: Backend> {
    DeConv(DeConvStage<B>),
    UpConv(UpConvStage<B>),
    FasterUpConv(FasterUpConvStage<B>),
    UpProj(UpProjStage<B>),
    FasterUpProj(FasterUpProjStage<B>),
}

impl<B: Backend> DecoderStage<B> {
    fn new(kind: &DecoderKind, in_channels: usize, device: &Device<B>) -> DepthNetResult<Self> {
        Ok(match *kind {
            DecoderKind::DeConv(kernel_size) => {
                Self::DeConv(DeConvStage::new(in_channels, kernel_size, device)?)
            }
            DecoderKind::UpConv => Self::UpConv(UpConvStage::new(in_channels, device)),
            DecoderKind::FasterUpConv => {
                Self::FasterUpConv(FasterUpConvStage::new(in_channels, device))
            }
            DecoderKind::UpProj => Self::UpProj(UpProjStage::new(in_channels, device)),
            DecoderKind::FasterUpProj => {
                Self::FasterUpProj(FasterUpProjStage::new(in_channels, device))
            }
        })
    }
}

impl<B: Backend> Upsample<B> for DecoderStage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::DeConv(stage) => stage.forward(input),
            Self::UpConv(stage) => stage.forward(input),
            Self::FasterUpConv(stage) => stage.forward(input),
            Self::UpProj(stage) => stage.forward(input),
            Self::FasterUpProj(stage) => stage.forward(input),
        }
    }
}

/// Configuration for the `Decoder` module.
#[derive(Config, Debug)]
pub struct DecoderConfig {
    /// The upsampling strategy.
    pub kind: DecoderKind,
    /// Channels of the incoming feature map; must be a positive multiple of 16.
    pub in_channels: usize,
}

impl DecoderConfig {
    /// Validate the configuration and return appropriate errors for invalid settings.
    pub fn validate(&self) -> DepthNetResult<()> {
        if self.in_channels == 0 || self.in_channels % DECODER_CHANNEL_DIVISOR != 0 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!(
                    "decoder input channels must be a positive multiple of {DECODER_CHANNEL_DIVISOR}, got {}",
                    self.in_channels
                ),
            });
        }

        self.kind.validate()
    }

    /// Initializes a new `Decoder` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<Decoder<B>> {
        self.validate()?;
        tracing::debug!(
            decoder = %self.kind.name(),
            in_channels = self.in_channels,
            "building decoder"
        );

        let c = self.in_channels;
        Ok(Decoder {
            layer1: DecoderStage::new(&self.kind, c, device)?,
            layer2: DecoderStage::new(&self.kind, c / 2, device)?,
            layer3: DecoderStage::new(&self.kind, c / 4, device)?,
            layer4: DecoderStage::new(&self.kind, c / 8, device)?,
            kind: Ignored(self.kind.clone()),
            in_channels: c,
        })
    }
}

/// Four upsampling stages of one kind.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    layer1: DecoderStage<B>,
    layer2: DecoderStage<B>,
    layer3: DecoderStage<B>,
    layer4: DecoderStage<B>,
    kind: Ignored<DecoderKind>,
    in_channels: usize,
}

impl<B: Backend> Decoder<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.layer1.forward(input);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        self.layer4.forward(x)
    }

    pub fn kind(&self) -> &DecoderKind {
        &self.kind
    }

    pub const fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub const fn out_channels(&self) -> usize {
        self.in_channels / DECODER_CHANNEL_DIVISOR
    }

    /// The stages in application order.
    pub fn stages(&self) -> [&DecoderStage<B>; DECODER_STAGES] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn all_kinds() -> [DecoderKind; 6] {
        [
            DecoderKind::DeConv(2),
            DecoderKind::DeConv(3),
            DecoderKind::UpConv,
            DecoderKind::FasterUpConv,
            DecoderKind::UpProj,
            DecoderKind::FasterUpProj,
        ]
    }

    #[test]
    fn every_kind_upsamples_sixteen_fold() {
        let device = Default::default();

        for in_channels in [16, 64] {
            for kind in all_kinds() {
                let decoder = DecoderConfig::new(kind.clone(), in_channels)
                    .init::<TestBackend>(&device)
                    .unwrap();
                assert_eq!(decoder.out_channels(), in_channels / 16);

                let out = decoder.forward(Tensor::ones([2, in_channels, 2, 3], &device));

                assert_eq!(
                    out.dims(),
                    [2, in_channels / 16, 32, 48],
                    "{} with {in_channels} channels",
                    kind.name()
                );
            }
        }
    }

    #[test]
    fn stages_halve_channels_one_at_a_time() {
        let device = Default::default();
        let decoder = DecoderConfig::new(DecoderKind::UpProj, 128)
            .init::<TestBackend>(&device)
            .unwrap();

        let mut x = Tensor::<TestBackend, 4>::ones([1, 128, 1, 2], &device);
        let mut expected = [128, 1, 2];
        for stage in decoder.stages() {
            x = stage.forward(x);
            expected = [expected[0] / 2, expected[1] * 2, expected[2] * 2];
            let [_, c, h, w] = x.dims();
            assert_eq!([c, h, w], expected);
        }
    }

    #[test]
    fn channels_must_be_a_multiple_of_sixteen() {
        let device = Default::default();

        for in_channels in [0, 8, 24, 100] {
            match DecoderConfig::new(DecoderKind::UpConv, in_channels).init::<TestBackend>(&device)
            {
                Err(DepthNetError::InvalidConfiguration { reason }) => {
                    assert!(reason.contains("multiple of 16"), "{reason}");
                }
                other => panic!("Expected InvalidConfiguration error, got {other:?}"),
            }
        }
    }
}
