//! Splitting grids into size-bounded tiles.

use crate::area::Area;
use crate::contour::ContourTracer;
use crate::grid::{ElevationGrid, TileBounds};
use crate::raster::Raster;
use crate::Result;
use std::collections::VecDeque;
use tracing::debug;

/// Sub-sample tolerance used when cropping to an area.
const CROP_TOLERANCE: f64 = 1e-6;

/// Options for [`ElevationGrid::make_tiles`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TilingOptions {
    /// Upper bound on `rows * cols` per tile; 0 disables splitting.
    pub max_nodes_per_tile: usize,
    /// Crop the grid to this area before splitting.
    pub area: Option<Area>,
}

/// A contiguous rectangular piece of an [`ElevationGrid`].
///
/// A tile owns a copy of its samples. Bounds are sample-center coordinates
/// and the increments are inherited from the parent grid.
#[derive(Debug, Clone)]
pub struct Tile {
    bounds: TileBounds,
    lon_increment: f64,
    lat_increment: f64,
    row_offset: usize,
    col_offset: usize,
    raster: Raster,
}

impl Tile {
    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn cols(&self) -> usize {
        self.raster.cols()
    }

    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    pub fn lon_increment(&self) -> f64 {
        self.lon_increment
    }

    pub fn lat_increment(&self) -> f64 {
        self.lat_increment
    }

    /// Row of the parent grid holding this tile's southernmost row.
    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Column of the parent grid holding this tile's westernmost column.
    pub fn col_offset(&self) -> usize {
        self.col_offset
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn lon_at(&self, col: usize) -> f64 {
        self.bounds.min_lon + col as f64 * self.lon_increment
    }

    pub fn lat_at(&self, row: usize) -> f64 {
        self.bounds.min_lat + row as f64 * self.lat_increment
    }

    /// Lowest and highest valid elevation.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.raster.min_max()
    }

    /// Human readable summary of size, extent and elevation range.
    pub fn get_stats(&self) -> String {
        let (min, max) = match self.min_max() {
            Some((min, max)) => (format!("{:.2}", min), format!("{:.2}", max)),
            None => ("n/a".to_string(), "n/a".to_string()),
        };
        format!(
            "tile with {} x {} points, bbox: ({:.2}, {:.2}, {:.2}, {:.2})\nminimum elevation: {}\nmaximum elevation: {}",
            self.rows(),
            self.cols(),
            self.bounds.min_lon,
            self.bounds.min_lat,
            self.bounds.max_lon,
            self.bounds.max_lat,
            min,
            max
        )
    }

    /// Contour levels of this tile and a tracer producing their polylines.
    ///
    /// Levels are `0, step, 2 * step, ...` strictly below the highest valid
    /// elevation. A positive `rdp_epsilon` simplifies every traced polyline.
    pub fn contour_lines(
        &self,
        step: f64,
        rdp_epsilon: Option<f64>,
    ) -> Result<(Vec<f64>, ContourTracer<'_>)> {
        let tracer = ContourTracer::new(self, step, rdp_epsilon)?;
        Ok((tracer.levels().to_vec(), tracer))
    }
}

/// A pending rectangle of the work-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
}

impl Region {
    fn nodes(&self) -> usize {
        self.rows * self.cols
    }

    /// Halve the larger dimension; the first half takes the extra sample.
    fn split(&self) -> (Region, Region) {
        if self.rows >= self.cols {
            let first = self.rows.div_ceil(2);
            (
                Region { rows: first, ..*self },
                Region {
                    row: self.row + first,
                    rows: self.rows - first,
                    ..*self
                },
            )
        } else {
            let first = self.cols.div_ceil(2);
            (
                Region { cols: first, ..*self },
                Region {
                    col: self.col + first,
                    cols: self.cols - first,
                    ..*self
                },
            )
        }
    }
}

impl ElevationGrid {
    /// Cut the grid into tiles of at most `max_nodes_per_tile` samples.
    ///
    /// Tiles are ordered by row offset then column offset, south-west first.
    /// When clip polygons were applied, tiles without any valid sample are
    /// dropped.
    pub fn make_tiles(&self, options: &TilingOptions) -> Result<Vec<Tile>> {
        let Some(root) = self.crop_region(options.area.as_ref()) else {
            debug!(area = ?options.area, "Requested area does not overlap the grid");
            return Ok(Vec::new());
        };

        let mut regions = Vec::new();
        if options.max_nodes_per_tile == 0 {
            regions.push(root);
        } else {
            let mut pending = VecDeque::from([root]);
            while let Some(region) = pending.pop_front() {
                if region.nodes() <= options.max_nodes_per_tile {
                    regions.push(region);
                } else {
                    let (a, b) = region.split();
                    pending.push_back(a);
                    pending.push_back(b);
                }
            }
            regions.sort_by_key(|r| (r.row, r.col));
        }

        let clipped = self.polygons().is_some();
        let mut tiles = Vec::with_capacity(regions.len());
        for region in regions {
            let tile = self.tile_for(region);
            if clipped && tile.raster.is_fully_masked() {
                debug!(
                    row = region.row,
                    col = region.col,
                    "Dropping fully masked tile"
                );
                continue;
            }
            tiles.push(tile);
        }

        debug!(
            tiles = tiles.len(),
            max_nodes = options.max_nodes_per_tile,
            "Split elevation grid"
        );
        Ok(tiles)
    }

    /// Rows and columns whose sample centers fall inside `area`.
    fn crop_region(&self, area: Option<&Area>) -> Option<Region> {
        let full = Region {
            row: 0,
            col: 0,
            rows: self.rows(),
            cols: self.cols(),
        };
        let Some(area) = area else {
            return Some(full);
        };

        let b = self.bounds();
        let (first_col, last_col) = index_range(
            area.min_lon(),
            area.max_lon(),
            b.min_lon,
            self.lon_increment(),
            self.cols(),
        )?;
        let (first_row, last_row) = index_range(
            area.min_lat(),
            area.max_lat(),
            b.min_lat,
            self.lat_increment(),
            self.rows(),
        )?;

        Some(Region {
            row: first_row,
            col: first_col,
            rows: last_row - first_row + 1,
            cols: last_col - first_col + 1,
        })
    }

    fn tile_for(&self, region: Region) -> Tile {
        Tile {
            bounds: TileBounds {
                min_lat: self.lat_at(region.row),
                max_lat: self.lat_at(region.row + region.rows - 1),
                min_lon: self.lon_at(region.col),
                max_lon: self.lon_at(region.col + region.cols - 1),
            },
            lon_increment: self.lon_increment(),
            lat_increment: self.lat_increment(),
            row_offset: region.row,
            col_offset: region.col,
            raster: self
                .raster()
                .sub_region(region.row, region.col, region.rows, region.cols),
        }
    }
}

/// Inclusive index range of samples `origin + i * increment` within `[lo, hi]`.
fn index_range(lo: f64, hi: f64, origin: f64, increment: f64, n: usize) -> Option<(usize, usize)> {
    let first = ((lo - origin) / increment - CROP_TOLERANCE).ceil().max(0.0);
    let last = ((hi - origin) / increment + CROP_TOLERANCE)
        .floor()
        .min((n - 1) as f64);
    if last < 0.0 || first > last {
        return None;
    }
    Some((first as usize, last as usize))
}
