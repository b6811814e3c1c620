//! Time forward passes of a DepthNet on random input.
//!
//! ```bash
//! cargo run --release --bin bench -- --decoder fasterupproj --iterations 20
//! ```

use std::time::{Duration, Instant};

use anyhow::{ensure, Result};
use burn::{prelude::*, tensor::Distribution};
use clap::Parser;
use depthnet_burn::DepthNet;
use depthnet_demos::{backend_name, create_device, init_tracing, NetworkArgs, SelectedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Batch size
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Input height
    #[arg(long, default_value_t = 228)]
    input_height: usize,

    /// Input width
    #[arg(long, default_value_t = 304)]
    input_width: usize,

    /// Untimed passes before measuring
    #[arg(long, default_value_t = 2)]
    warmup: usize,

    /// Timed passes
    #[arg(short, long, default_value_t = 10)]
    iterations: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    ensure!(cli.iterations > 0, "--iterations must be positive");

    let device = create_device();
    let model: DepthNet<SelectedBackend> = cli.network.to_config()?.init(&device)?;
    let input = Tensor::<SelectedBackend, 4>::random(
        [
            cli.batch_size,
            cli.network.in_channels,
            cli.input_height,
            cli.input_width,
        ],
        Distribution::Normal(0.0, 1.0),
        &device,
    );

    for _ in 0..cli.warmup {
        // Reading the data back waits for the backend to finish.
        let _ = model.forward(input.clone())?.into_data();
    }

    let mut timings = Vec::with_capacity(cli.iterations);
    for iteration in 0..cli.iterations {
        let start = Instant::now();
        let _ = model.forward(input.clone())?.into_data();
        let elapsed = start.elapsed();
        tracing::debug!(iteration, elapsed_ms = elapsed.as_secs_f64() * 1e3, "forward pass");
        timings.push(elapsed);
    }

    let total: Duration = timings.iter().sum();
    let mean = total / cli.iterations as u32;
    let fastest = timings.iter().min().copied().unwrap_or_default();
    let slowest = timings.iter().max().copied().unwrap_or_default();

    println!("Backend: {}", backend_name());
    println!(
        "Network: resnet{} + {}, batch {} at {}x{}",
        cli.network.depth, cli.network.decoder, cli.batch_size, cli.input_height, cli.input_width
    );
    println!(
        "Forward: mean {:.2} ms, min {:.2} ms, max {:.2} ms over {} passes",
        mean.as_secs_f64() * 1e3,
        fastest.as_secs_f64() * 1e3,
        slowest.as_secs_f64() * 1e3,
        cli.iterations
    );

    Ok(())
}
