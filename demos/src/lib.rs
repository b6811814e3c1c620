//! DepthNet demos
//!
//! - `summary`: build a network, run one forward pass and report shapes and parameter groups
//! - `bench`: time repeated forward passes
//!
//! ```bash
//! cargo run --bin summary -- --depth 18 --decoder fasterupproj
//! cargo run --release --bin bench -- --depth 50 --iterations 20
//! RUST_LOG=debug cargo run --bin summary -- --json
//! ```

pub mod backend;

use anyhow::Result;
use clap::Args;
use depthnet_burn::{DecoderKind, DepthNetConfig, ResizeMode};
use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{backend_name, create_device, SelectedBackend, SelectedDevice};

/// Network options shared by every demo.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// ResNet depth: 18, 34, 50, 101 or 152
    #[arg(long, default_value_t = 50)]
    pub depth: usize,

    /// Decoder: deconv2..deconv9, upconv, upproj or fasterupproj
    #[arg(long, default_value = "upproj")]
    pub decoder: String,

    /// Output height
    #[arg(long, default_value_t = 228)]
    pub height: usize,

    /// Output width
    #[arg(long, default_value_t = 304)]
    pub width: usize,

    /// Input channels
    #[arg(long, default_value_t = 3)]
    pub in_channels: usize,

    /// Start the encoder from torchvision weights
    #[arg(long)]
    pub pretrained: bool,

    /// Use nearest-neighbour instead of bilinear output resizing
    #[arg(long)]
    pub nearest: bool,
}

impl NetworkArgs {
    pub fn to_config(&self) -> Result<DepthNetConfig> {
        let decoder: DecoderKind = self.decoder.parse()?;
        let resize = if self.nearest {
            ResizeMode::Nearest
        } else {
            ResizeMode::Bilinear
        };

        Ok(DepthNetConfig::new()
            .with_depth(self.depth)
            .with_decoder(decoder)
            .with_output_size([self.height, self.width])
            .with_in_channels(self.in_channels)
            .with_pretrained(self.pretrained)
            .with_resize(resize))
    }
}

/// Install a `fmt` subscriber honoring `RUST_LOG`, `info` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}
