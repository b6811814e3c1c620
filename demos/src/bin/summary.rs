//! Build a DepthNet, run one forward pass on random input and print what came out.
//!
//! ```bash
//! cargo run --bin summary -- --depth 18 --decoder deconv3 --height 128 --width 160
//! cargo run --bin summary -- --json
//! ```

use anyhow::Result;
use burn::{backend::Autodiff, prelude::*, tensor::Distribution};
use clap::Parser;
use depthnet_burn::{DepthNet, ParameterGroup};
use depthnet_demos::{backend_name, create_device, init_tracing, NetworkArgs, SelectedBackend};
use serde::Serialize;

type SummaryBackend = Autodiff<SelectedBackend>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Batch size of the random input
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Input height
    #[arg(long, default_value_t = 228)]
    input_height: usize,

    /// Input width
    #[arg(long, default_value_t = 304)]
    input_width: usize,

    /// Base learning rate used to report the group learning rates
    #[arg(long, default_value_t = 1e-2)]
    base_lr: f64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct GroupSummary {
    name: &'static str,
    lr_multiplier: f64,
    learning_rate: f64,
    tensors: usize,
}

#[derive(Serialize, Debug)]
struct Summary {
    backend: &'static str,
    decoder: String,
    encoder_channels: usize,
    decoder_channels: [usize; 2],
    input_shape: [usize; 4],
    output_shape: [usize; 4],
    num_params: usize,
    groups: Vec<GroupSummary>,
}

impl From<ParameterGroup> for GroupSummary {
    fn from(group: ParameterGroup) -> Self {
        Self {
            name: group.name,
            lr_multiplier: group.lr_multiplier,
            learning_rate: group.learning_rate,
            tensors: group.params.len(),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let device = create_device();

    let config = cli.network.to_config()?;
    let model: DepthNet<SummaryBackend> = config.init(&device)?;

    let input_shape = [
        cli.batch_size,
        cli.network.in_channels,
        cli.input_height,
        cli.input_width,
    ];
    let input = Tensor::random(input_shape, Distribution::Normal(0.0, 1.0), &device);
    let output = model.forward(input)?;
    tracing::info!(output = ?output.dims(), "forward pass finished");

    let decoder = model.decoder();
    let summary = Summary {
        backend: backend_name(),
        decoder: decoder.kind().name(),
        encoder_channels: model.encoder().out_channels(),
        decoder_channels: [decoder.in_channels(), decoder.out_channels()],
        input_shape,
        output_shape: output.dims(),
        num_params: model.num_params(),
        groups: model
            .parameter_groups(cli.base_lr)
            .into_iter()
            .map(GroupSummary::from)
            .collect(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Backend: {}", summary.backend);
    println!("Encoder: {} ({} channels)", model.encoder().depth().name(), summary.encoder_channels);
    println!(
        "Decoder: {} ({} -> {} channels)",
        summary.decoder, summary.decoder_channels[0], summary.decoder_channels[1]
    );
    println!("Input:  {:?}", summary.input_shape);
    println!("Output: {:?}", summary.output_shape);
    println!("Parameters: {}", summary.num_params);
    for group in &summary.groups {
        println!(
            "  {:<8} {:>4} tensors  lr x{:<4} = {}",
            group.name, group.tensors, group.lr_multiplier, group.learning_rate
        );
    }

    Ok(())
}
