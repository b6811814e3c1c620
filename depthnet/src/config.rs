//! Enumeration types for DepthNet configuration.

use core::str::FromStr;

use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::error::{DepthNetError, DepthNetResult};

/// Number of upsampling stages in every decoder.
pub const DECODER_STAGES: usize = 4;

/// Channel divisor of a full decoder: every stage halves the channel count.
pub const DECODER_CHANNEL_DIVISOR: usize = 1 << DECODER_STAGES;

/// Defines the upsampling strategy of the decoder.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum DecoderKind {
    /// Transposed convolution with the given square kernel size.
    DeConv(usize),
    /// Unpool followed by a 5x5 convolution.
    UpConv,
    /// Four padded convolutions recombined by pixel shuffle.
    FasterUpConv,
    /// Unpool followed by a two-branch projection.
    UpProj,
    /// Two-branch projection built from pixel-shuffle blocks.
    FasterUpProj,
}

impl DecoderKind {
    /// The canonical name, e.g. `deconv3` or `upproj`.
    pub fn name(&self) -> String {
        match self {
            Self::DeConv(kernel_size) => format!("deconv{kernel_size}"),
            Self::UpConv => "upconv".to_string(),
            Self::FasterUpConv => "fasterupconv".to_string(),
            Self::UpProj => "upproj".to_string(),
            Self::FasterUpProj => "fasterupproj".to_string(),
        }
    }

    /// Check the variant's own parameters.
    pub fn validate(&self) -> DepthNetResult<()> {
        if let Self::DeConv(kernel_size) = *self {
            if kernel_size < 2 {
                return Err(DepthNetError::InvalidConfiguration {
                    reason: format!("kernel_size out of range: {kernel_size}"),
                });
            }

            let (padding, output_padding) = deconv_padding(kernel_size);
            let growth = kernel_size as i64 + output_padding as i64 - 2 * padding as i64 - 2;
            if growth != 0 {
                return Err(DepthNetError::InvalidConfiguration {
                    reason: format!("deconv parameters incorrect for kernel_size {kernel_size}"),
                });
            }
        }

        Ok(())
    }
}

/// Padding and output padding that make a stride-2 transposed convolution double its input.
pub(crate) const fn deconv_padding(kernel_size: usize) -> (usize, usize) {
    (kernel_size.saturating_sub(1) / 2, kernel_size % 2)
}

impl FromStr for DecoderKind {
    type Err = DepthNetError;

    /// Parses `deconv2`..`deconv9`, `upconv`, `upproj` and `fasterupproj`.
    ///
    /// `FasterUpConv` has no name here; select it through a configuration instead.
    fn from_str(name: &str) -> DepthNetResult<Self> {
        if let Some(suffix) = name.strip_prefix("deconv") {
            let kernel_size = match suffix.as_bytes() {
                [digit @ b'0'..=b'9'] => usize::from(digit - b'0'),
                _ => {
                    return Err(DepthNetError::InvalidConfiguration {
                        reason: format!(
                            "invalid option for decoder: {name} (expected deconv followed by a single digit)"
                        ),
                    })
                }
            };
            return Ok(Self::DeConv(kernel_size));
        }

        match name {
            "upproj" => Ok(Self::UpProj),
            "upconv" => Ok(Self::UpConv),
            "fasterupproj" => Ok(Self::FasterUpProj),
            _ => Err(DepthNetError::InvalidConfiguration {
                reason: format!("invalid option for decoder: {name}"),
            }),
        }
    }
}

/// Defines how the predicted map is resized to the output size.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ResizeMode {
    /// Bilinear interpolation with aligned corners.
    Bilinear,
    /// Nearest neighbour, for backends without a bilinear backward pass.
    Nearest,
}

impl ResizeMode {
    /// Resize a `[batch, channels, height, width]` map to `[out_h, out_w]`.
    ///
    /// Bilinear sampling aligns corners: input and output corner pixels coincide and
    /// interior samples sit at `(in - 1) / (out - 1)` steps.
    pub fn resize<B: Backend>(&self, input: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
        interpolate(input, size, InterpolateOptions::new(self.clone().into()))
    }
}

impl From<ResizeMode> for InterpolateMode {
    fn from(mode: ResizeMode) -> Self {
        match mode {
            ResizeMode::Bilinear => Self::Bilinear,
            ResizeMode::Nearest => Self::Nearest,
        }
    }
}
