//! Command-line interface for butterfly-tiles

pub mod progress;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use butterfly_tiles::{
    pipeline, read_index, Config, ConfigOverrides, Diagnostics, OverwriteBehavior,
    PipelineOptions, TileCoord,
};
use clap::{Args, Parser, Subcommand};

pub use progress::ProgressManager;

#[derive(Parser)]
#[command(name = "butterfly-tiles")]
#[command(version)]
#[command(about = "Pack routing graph tiles into an indexed tar extract")]
#[command(long_about = "Packs a directory of .gph routing tiles into one tar extract:
  butterfly-tiles build --config valhalla.json
  butterfly-tiles build --tile-dir tiles --tile-extract tiles.tar --bbox 4.2,50.7,4.5,50.9
  butterfly-tiles build --config valhalla.json --with-traffic
  butterfly-tiles inspect tiles.tar

When tile_dir is missing but tile_extract exists, --with-traffic alone rebuilds
only the traffic extract from the existing tile extract.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the tile extract (and optionally the traffic extract)
    Build(BuildArgs),
    /// Print the index of an extract
    Inspect {
        /// Tile or traffic extract
        archive: PathBuf,
    },
}

#[derive(Args)]
pub struct BuildArgs {
    /// JSON config file with a "mjolnir" section
    #[arg(short, long, conflicts_with = "inline_config")]
    pub config: Option<PathBuf>,

    /// JSON config given inline
    #[arg(short, long)]
    pub inline_config: Option<String>,

    /// Directory of .gph tiles (overrides mjolnir.tile_dir)
    #[arg(long)]
    pub tile_dir: Option<PathBuf>,

    /// Tile extract path (overrides mjolnir.tile_extract)
    #[arg(long)]
    pub tile_extract: Option<PathBuf>,

    /// Traffic extract path (overrides mjolnir.traffic_extract)
    #[arg(long)]
    pub traffic_extract: Option<PathBuf>,

    /// Write the tile extract here instead of tile_extract
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep tiles touching "minx,miny,maxx,maxy" (degrees)
    #[arg(short, long, allow_hyphen_values = true, conflicts_with = "polygons")]
    pub bbox: Option<String>,

    /// Keep tiles intersecting the GeoJSON polygons in this directory
    #[arg(short, long)]
    pub polygons: Option<PathBuf>,

    /// Also build the traffic extract
    #[arg(long)]
    pub with_traffic: bool,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build(args) => build(args),
            Commands::Inspect { archive } => inspect(&archive),
        }
    }
}

fn load_config(args: &BuildArgs) -> Result<Config> {
    let config = match (&args.config, &args.inline_config) {
        (Some(path), _) => Config::from_file(path)?,
        (None, Some(json)) => Config::from_json(json).context("Parsing --inline-config")?,
        (None, None) => Config::default(),
    };
    Ok(config.with_overrides(ConfigOverrides {
        tile_dir: args.tile_dir.clone(),
        tile_extract: args.tile_extract.clone(),
        traffic_extract: args.traffic_extract.clone(),
    }))
}

fn build(args: BuildArgs) -> Result<()> {
    let config = load_config(&args)?;
    let diagnostics = Diagnostics::from_verbosity(args.verbose, args.quiet);

    let progress = (!args.quiet).then(|| ProgressManager::new("📦 Packing tiles"));
    let options = PipelineOptions {
        config: config.mjolnir,
        output: args.output,
        bbox: args.bbox,
        polygons: args.polygons,
        with_traffic: args.with_traffic,
        overwrite: OverwriteBehavior::from(args.overwrite),
        progress: progress.as_ref().map(ProgressManager::callback),
    };

    let result = pipeline::run(&options, &diagnostics);
    if let Some(progress) = &progress {
        progress.finish();
    }
    let report = result?;

    if let Some(extract) = &report.extract {
        eprintln!(
            "✅ {} tiles written to {}",
            extract.tile_count(),
            extract.path.display()
        );
    }
    if let Some(traffic) = &report.traffic {
        eprintln!(
            "✅ {} traffic tiles written to {}",
            traffic.tile_count(),
            traffic.path.display()
        );
    }
    Ok(())
}

fn inspect(archive: &Path) -> Result<()> {
    let entries = read_index(archive)?;
    if entries.is_empty() {
        bail!("{} has an empty index", archive.display());
    }

    println!("{:>12} {:>5} {:>10} {:>14} {:>10}", "tile_id", "level", "index", "offset", "size");
    for entry in &entries {
        let coord = TileCoord::from_tile_id(u64::from(entry.tile_id));
        println!(
            "{:>12} {:>5} {:>10} {:>14} {:>10}",
            entry.tile_id, coord.level, coord.index, entry.offset, entry.size
        );
    }
    eprintln!("{} tiles in {}", entries.len(), archive.display());
    Ok(())
}
