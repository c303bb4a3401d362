use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use density_mask::io::{load_config, load_records};
use density_mask::{DensityMaskPipeline, MaskConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "density-mask")]
#[command(about = "Rasterize UV triangles into refined density masks (UDIM 1001/1002)")]
struct Cli {
    /// JSON array of { region, density, uvs } triangle records
    input: PathBuf,

    /// Directory receiving the four PNG masks
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// File name prefix, e.g. "horse_density" -> horse_density_1001.png
    #[arg(long, default_value = "density")]
    prefix: String,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Ramp anchor as "u,v"
    #[arg(long)]
    ramp_center: Option<String>,

    /// Block noise cells per UV unit
    #[arg(long)]
    block_scale: Option<f64>,

    #[arg(long)]
    block_strength: Option<f64>,

    #[arg(long)]
    low_scale: Option<f64>,

    #[arg(long)]
    low_strength: Option<f64>,

    /// Gaussian sigma in pixels, 0 disables the blur
    #[arg(long)]
    blur_radius: Option<f64>,

    #[arg(long)]
    no_ramp: bool,

    #[arg(long)]
    no_low_noise: bool,

    #[arg(long)]
    no_block_noise: bool,
}

fn parse_pair(text: &str) -> Result<[f64; 2]> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        bail!("expected \"u,v\", got {text:?}");
    }
    let u = parts[0].parse::<f64>().with_context(|| format!("invalid u in {text:?}"))?;
    let v = parts[1].parse::<f64>().with_context(|| format!("invalid v in {text:?}"))?;
    Ok([u, v])
}

fn build_config(cli: &Cli) -> Result<MaskConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MaskConfig::default(),
    };

    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(center) = &cli.ramp_center {
        config.noise.ramp_center = parse_pair(center)?;
    }
    if let Some(scale) = cli.block_scale {
        config.noise.block_scale = scale;
    }
    if let Some(strength) = cli.block_strength {
        config.noise.block_strength = strength;
    }
    if let Some(scale) = cli.low_scale {
        config.noise.low_scale = scale;
    }
    if let Some(strength) = cli.low_strength {
        config.noise.low_strength = strength;
    }
    if let Some(radius) = cli.blur_radius {
        config.noise.blur_radius = radius;
    }
    if cli.no_ramp {
        config.layers.ramp = false;
    }
    if cli.no_low_noise {
        config.layers.low_noise = false;
    }
    if cli.no_block_noise {
        config.layers.block_noise = false;
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<Vec<PathBuf>> {
    let config = build_config(cli)?;
    let pipeline = DensityMaskPipeline::new(config).context("configuration rejected")?;

    let batch = load_records(&cli.input)
        .with_context(|| format!("failed to read triangle records from {}", cli.input.display()))?;
    let output = pipeline.run_batch(&batch);

    let stats = &output.stats;
    tracing::info!(
        records = stats.records,
        rasterized = stats.total_rasterized(),
        wrong_vertex_count = stats.skipped_vertex_count,
        outside_tiles = stats.skipped_tile,
        out_of_bounds = stats.skipped_out_of_tile,
        degenerate = stats.skipped_degenerate,
        undecodable = stats.skipped_undecodable,
        "triangle summary"
    );

    output
        .write(&cli.output, &cli.prefix)
        .with_context(|| format!("failed to write masks into {}", cli.output.display()))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_outputs(paths: &[PathBuf]) {
    for path in paths {
        println!(" - {}", path.display());
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let written = run(&cli)?;
    print_outputs(&written);
    Ok(())
}
