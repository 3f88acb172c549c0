//! # dem-contour
//!
//! Elevation contour extraction from SRTM `.hgt` and GeoTIFF elevation tiles.
//!
//! ## Overview
//!
//! Elevation data comes in 1x1 degree cells named after their south-west
//! corner (`N43E006` covers 43°N to 44°N and 6°E to 7°E). Processing a request
//! goes through these stages:
//!
//! 1. **Resolution**: every cell touching the requested [`Area`] is looked up
//!    in a ranked list of [`Source`]s; the first source holding a file wins.
//! 2. **Loading**: the file is decoded into an [`ElevationGrid`], optionally
//!    upsampled with a bicubic kernel ([`LoadOptions::smooth_ratio`]).
//! 3. **Masking**: samples outside every clip [`Polygon`] are marked as
//!    no-data.
//! 4. **Tiling**: the grid is cropped to the area and split into [`Tile`]s of
//!    at most [`TilingOptions::max_nodes_per_tile`] samples.
//! 5. **Contouring**: each tile is traced with marching squares at levels
//!    `0, step, 2 * step, ...`, optionally simplified with Douglas-Peucker.
//!
//! Grids store their southernmost row first. Bounds are the coordinates of the
//! outermost sample centers, so an unbordered 3 arc-second `.hgt` tile spans
//! exactly one degree with 1201 samples per side.
//!
//! ## Example
//!
//! ```no_run
//! use dem_contour::{ElevationGrid, LoadOptions, TilingOptions};
//!
//! let grid = ElevationGrid::from_file("hgt/SRTM3/N43E006.hgt", &LoadOptions::default())?;
//! let tiles = grid.make_tiles(&TilingOptions {
//!     max_nodes_per_tile: 500_000,
//!     area: Some("6.2:43.1:7.1:43.8".parse()?),
//! })?;
//!
//! for tile in &tiles {
//!     println!("{}", tile.get_stats());
//!     let (levels, tracer) = tile.contour_lines(20.0, Some(0.0001))?;
//!     let contours = tracer.trace_all();
//!     println!("{} levels, {} lines", levels.len(), contours.line_count());
//! }
//! # Ok::<(), dem_contour::DemError>(())
//! ```

mod area;
mod config;
mod contour;
mod error;
mod grid;
mod loader;
mod mask;
mod pipeline;
mod poly_file;
mod raster;
mod simplify;
mod sources;
mod tile_id;
mod tiling;

pub use area::Area;
pub use config::ContourConfig;
pub use contour::{contour_levels, ContourLevel, ContourSet, ContourTracer, Polyline};
pub use error::DemError;
pub use grid::{ElevationGrid, GridHeader, TileBounds};
pub use loader::{covered_area, probe, ElevationUnit, LoadOptions, SRTM_VOID};
pub use mask::{polygon_mask, polygons_bounds, PointTransform, Polygon, PolygonMask};
pub use pipeline::{process_file, process_files, TileContours};
pub use poly_file::{parse_poly, read_poly_file};
pub use raster::Raster;
pub use simplify::simplify;
pub use sources::{
    resolve_files, DirectorySource, LayeredSource, PriorityResolver, ResolvedFile, Source,
    SourceBinding, SourcePool, SourceSpec, TileResolver,
};
pub use tile_id::TileId;
pub use tiling::{Tile, TilingOptions};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
