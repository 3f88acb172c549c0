//! End-to-end processing of elevation files.

use crate::config::ContourConfig;
use crate::contour::ContourSet;
use crate::grid::{ElevationGrid, TileBounds};
use crate::mask::Polygon;
use crate::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contours of one tile together with where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct TileContours {
    pub source: PathBuf,
    pub bounds: TileBounds,
    pub row_offset: usize,
    pub col_offset: usize,
    pub stats: String,
    pub contours: ContourSet,
}

/// Load, mask, split and contour every file.
///
/// Files are processed in parallel; the result lists the tiles of the first
/// file first, each file's tiles in tiling order. Any file failing to load
/// aborts the run.
pub fn process_files<P>(
    files: &[P],
    polygons: Option<&[Polygon]>,
    config: &ContourConfig,
) -> Result<Vec<TileContours>>
where
    P: AsRef<Path> + Sync,
{
    config.validate()?;

    let per_file = files
        .par_iter()
        .map(|file| process_file(file.as_ref(), polygons, config))
        .collect::<Result<Vec<_>>>()?;

    let tiles: Vec<TileContours> = per_file.into_iter().flatten().collect();
    info!(
        files = files.len(),
        tiles = tiles.len(),
        lines = tiles.iter().map(|t| t.contours.line_count()).sum::<usize>(),
        "Contour extraction complete"
    );
    Ok(tiles)
}

/// Contours of every tile of a single file.
pub fn process_file(
    path: &Path,
    polygons: Option<&[Polygon]>,
    config: &ContourConfig,
) -> Result<Vec<TileContours>> {
    let mut grid = ElevationGrid::from_file(path, &config.load_options())?;
    if let Some(polygons) = polygons {
        grid.apply_polygons(polygons.to_vec());
    }

    let tiles = grid.make_tiles(&config.tiling_options())?;
    tiles
        .par_iter()
        .map(|tile| {
            let (levels, tracer) = tile.contour_lines(config.step, config.rdp_epsilon)?;
            let contours = tracer.trace_all();
            let stats = tile.get_stats();
            info!(
                path = %path.display(),
                levels = levels.len(),
                lines = contours.line_count(),
                "{}",
                stats.replace('\n', ", ")
            );
            Ok(TileContours {
                source: path.to_path_buf(),
                bounds: tile.bounds(),
                row_offset: tile.row_offset(),
                col_offset: tile.col_offset(),
                stats,
                contours,
            })
        })
        .collect()
}
