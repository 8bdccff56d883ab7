//! tacmap - terrain tile lookup, sampling and imagery classification.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tacmap_dem::DatasetType;
use tacmap_runner::{
    classify_file, init_logging, LatLon, Pipeline, PipelineConfig, Result,
};
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "tacmap")]
#[command(version, about = "Terrain tile lookup, sampling and imagery classification")]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify an 8-bit TIFF image into terrain feature categories
    Classify {
        image: PathBuf,

        /// Override the configured sampling stride
        #[arg(long)]
        stride: Option<u32>,

        /// Print statistics only
        #[arg(long)]
        summary: bool,
    },

    #[command(flatten)]
    Terrain(TerrainCommand),
}

/// Commands that read tiles through the storage client.
#[derive(Subcommand)]
enum TerrainCommand {
    /// Find the tile covering a point
    Resolve {
        /// Dataset: elevation (dem) or vegetation (ndvi)
        #[arg(long, short, default_value = "elevation")]
        dataset: DatasetType,

        /// Point as LAT,LON
        #[arg(allow_hyphen_values = true)]
        point: LatLon,
    },

    /// Sample dataset values at one or more points
    Sample {
        #[arg(long, short, default_value = "elevation")]
        dataset: DatasetType,

        /// Points as LAT,LON
        #[arg(required = true, allow_hyphen_values = true)]
        points: Vec<LatLon>,
    },

    /// Elevation profile between two points
    Profile {
        #[arg(allow_hyphen_values = true)]
        from: LatLon,

        #[arg(allow_hyphen_values = true)]
        to: LatLon,

        /// Number of evenly spaced samples, endpoints included
        #[arg(long, short, default_value_t = 100)]
        samples: usize,
    },

    /// Mobility factor from vegetation and slope at a point
    Mobility {
        #[arg(allow_hyphen_values = true)]
        point: LatLon,
    },

    /// List the entries of a tile archive
    ArchiveList {
        /// Storage path of the archive
        path: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tacmap_metrics::describe_metrics();

    if let Err(e) = run(cli).await {
        error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Classify {
            image,
            stride,
            summary,
        } => {
            let mut analysis = config.classification;
            if let Some(stride) = stride {
                analysis.stride = stride;
            }
            analysis.validate()?;

            let result = tokio::task::spawn_blocking(move || classify_file(image, analysis)).await??;
            if summary {
                print_json(&result.stats)
            } else {
                print_json(&result)
            }
        }
        Command::Terrain(command) => {
            let pipeline = Pipeline::from_config(&config)?;
            run_terrain(&pipeline, command).await?;
            debug!(stats = ?pipeline.stats(), "sampler statistics");
            Ok(())
        }
    }
}

async fn run_terrain(pipeline: &Pipeline, command: TerrainCommand) -> Result<()> {
    match command {
        TerrainCommand::Resolve { dataset, point } => {
            print_json(&pipeline.resolve(dataset, point).await)
        }
        TerrainCommand::Sample { dataset, points } => {
            print_json(&pipeline.sample(dataset, &points).await)
        }
        TerrainCommand::Profile { from, to, samples } => {
            print_json(&pipeline.profile(from, to, samples).await)
        }
        TerrainCommand::Mobility { point } => print_json(&pipeline.mobility(point).await?),
        TerrainCommand::ArchiveList { path } => {
            print_json(&pipeline.archive_entries(&path).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
