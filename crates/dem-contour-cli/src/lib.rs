//! Command-line front end of `dem-contour`.
//!
//! Settings come from an optional YAML file and are overridden by flags.
//! Input files are either given on the command line or resolved from the
//! configured sources for the requested area or polygon file.

use clap::{Parser, ValueEnum};
use dem_contour::{
    covered_area, process_files, read_poly_file, resolve_files, ContourConfig, DemError,
    ElevationUnit, SourceSpec,
};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Errors reported by the command-line tool.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Dem(#[from] DemError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Elevation unit accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    Meters,
    Feet,
}

impl From<UnitArg> for ElevationUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Meters => ElevationUnit::Meters,
            UnitArg::Feet => ElevationUnit::Feet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "demcontour", author, version, about = "Extract contour lines from SRTM and GeoTIFF elevation tiles", long_about = None)]
pub struct Args {
    /// Elevation files to process; resolved from --source when empty.
    pub files: Vec<PathBuf>,

    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Area to process, as lonMin:latMin:lonMax:latMax.
    #[arg(short, long, allow_hyphen_values = true)]
    pub area: Option<String>,

    /// Osmosis .poly file with the clip polygons.
    #[arg(short, long)]
    pub polygon: Option<PathBuf>,

    /// Elevation difference between contour levels.
    #[arg(short, long)]
    pub step: Option<f64>,

    #[arg(long, value_enum)]
    pub unit: Option<UnitArg>,

    /// Maximum number of samples per tile; 0 disables splitting.
    #[arg(long)]
    pub max_nodes_per_tile: Option<usize>,

    /// Douglas-Peucker tolerance in degrees.
    #[arg(long)]
    pub rdp_epsilon: Option<f64>,

    /// Integer upsampling factor applied before contouring.
    #[arg(long)]
    pub smooth: Option<usize>,

    /// Treat samples at or below this value as voids.
    #[arg(long, allow_hyphen_values = true)]
    pub void_range_max: Option<f32>,

    /// Sources in priority order, e.g. srtm1,view3.
    #[arg(long, value_delimiter = ',')]
    pub source: Vec<String>,

    /// Root directory of the source tiles.
    #[arg(long)]
    pub hgt_dir: Option<PathBuf>,

    /// Write JSON here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the resolved files and exit.
    #[arg(long)]
    pub list_files: bool,
}

/// Merge the configuration file and the flags.
pub fn build_config(args: &Args) -> Result<ContourConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => ContourConfig::from_file(path)?,
        None => ContourConfig::default(),
    };

    if let Some(area) = &args.area {
        config.area = Some(area.parse()?);
    }
    if let Some(polygon) = &args.polygon {
        config.polygon_file = Some(polygon.clone());
    }
    if let Some(step) = args.step {
        config.step = step;
    }
    if let Some(unit) = args.unit {
        config.unit = unit.into();
    }
    if let Some(max) = args.max_nodes_per_tile {
        config.max_nodes_per_tile = max;
    }
    if let Some(eps) = args.rdp_epsilon {
        config.rdp_epsilon = Some(eps);
    }
    if let Some(ratio) = args.smooth {
        config.smooth_ratio = ratio;
    }
    if let Some(max) = args.void_range_max {
        config.void_range_max = Some(max);
    }
    if !args.source.is_empty() {
        config.sources = args
            .source
            .iter()
            .map(|s| s.parse::<SourceSpec>())
            .collect::<Result<_, _>>()?;
    }
    if let Some(dir) = &args.hgt_dir {
        config.data_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run the tool, writing JSON (or the file list) to `out`.
pub fn run<W: Write>(args: &Args, out: &mut W) -> Result<(), CliError> {
    let config = build_config(args)?;

    let polygons = config
        .polygon_file
        .as_ref()
        .map(read_poly_file)
        .transpose()?;

    let files = if args.files.is_empty() {
        if config.area.is_none() && polygons.is_none() {
            return Err(CliError::Usage(
                "give input files, or an area or polygon file to resolve them".to_string(),
            ));
        }
        if config.sources.is_empty() {
            return Err(CliError::Usage(
                "no input files and no source configured".to_string(),
            ));
        }
        let resolver = config.resolver()?;
        let resolved = resolve_files(config.area.as_ref(), polygons.as_deref(), &resolver)?;
        if args.list_files {
            for file in &resolved {
                let marker = if file.alternate_provider { " (alternate)" } else { "" };
                writeln!(out, "{}{}", file.path.display(), marker)?;
            }
            return Ok(());
        }
        resolved.into_iter().map(|f| f.path).collect()
    } else {
        args.files.clone()
    };

    if args.list_files {
        for file in &files {
            writeln!(out, "{}", file.display())?;
        }
        return Ok(());
    }
    if files.is_empty() {
        warn!("No elevation file found for the requested area");
    }

    if let Some(bounds) = covered_area(&files, &config.load_options())? {
        info!(
            files = files.len(),
            "Covered area: {:.4}:{:.4}:{:.4}:{:.4}",
            bounds.min_lon,
            bounds.min_lat,
            bounds.max_lon,
            bounds.max_lat
        );
    }

    let results = process_files(&files, polygons.as_deref(), &config)?;
    serde_json::to_writer_pretty(&mut *out, &results)?;
    writeln!(out)?;
    Ok(())
}
