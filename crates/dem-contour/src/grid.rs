//! Georeferenced elevation grids.

use crate::mask::{polygon_mask, Polygon, PolygonMask};
use crate::raster::Raster;
use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Geographic bounds of a grid or tile.
///
/// For grids these are sample-center coordinates: the westernmost column sits
/// exactly on `min_lon`, the northernmost row on `max_lat`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl TileBounds {
    /// Whether two boxes share any point (touching edges count).
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &TileBounds) -> TileBounds {
        TileBounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

/// Dimensions and georeference of a grid, without samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    pub rows: usize,
    pub cols: usize,
    pub bounds: TileBounds,
}

impl GridHeader {
    /// Degrees between adjacent columns.
    pub fn lon_increment(&self) -> f64 {
        (self.bounds.max_lon - self.bounds.min_lon) / (self.cols - 1) as f64
    }

    /// Degrees between adjacent rows.
    pub fn lat_increment(&self) -> f64 {
        (self.bounds.max_lat - self.bounds.min_lat) / (self.rows - 1) as f64
    }

    fn validate(&self) -> Result<()> {
        if self.rows < 2 || self.cols < 2 {
            return Err(DemError::InvalidOption(format!(
                "a georeferenced grid needs at least 2 x 2 samples, got {} x {}",
                self.rows, self.cols
            )));
        }
        let b = &self.bounds;
        if !(b.min_lon < b.max_lon && b.min_lat < b.max_lat) {
            return Err(DemError::Georeference(format!(
                "degenerate bounds ({}, {}, {}, {})",
                b.min_lon, b.min_lat, b.max_lon, b.max_lat
            )));
        }
        Ok(())
    }
}

/// A rectangular elevation grid with its georeference.
///
/// Row 0 is the southernmost row and column 0 the westernmost. Samples are
/// mutated only by [`ElevationGrid::apply_polygons`]; tiles cut from the grid
/// own copies of their samples.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    header: GridHeader,
    raster: Raster,
    polygons: Option<Vec<Polygon>>,
}

impl ElevationGrid {
    /// Pair a raster with its georeference.
    pub fn new(header: GridHeader, raster: Raster) -> Result<Self> {
        header.validate()?;
        if raster.rows() != header.rows || raster.cols() != header.cols {
            return Err(DemError::InvalidOption(format!(
                "raster is {} x {} but header says {} x {}",
                raster.rows(),
                raster.cols(),
                header.rows,
                header.cols
            )));
        }
        Ok(ElevationGrid {
            header,
            raster,
            polygons: None,
        })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn rows(&self) -> usize {
        self.header.rows
    }

    pub fn cols(&self) -> usize {
        self.header.cols
    }

    pub fn bounds(&self) -> TileBounds {
        self.header.bounds
    }

    pub fn lon_increment(&self) -> f64 {
        self.header.lon_increment()
    }

    pub fn lat_increment(&self) -> f64 {
        self.header.lat_increment()
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Clip polygons, if clipping was requested.
    pub fn polygons(&self) -> Option<&[Polygon]> {
        self.polygons.as_deref()
    }

    /// Longitude of a column's sample centers.
    pub fn lon_at(&self, col: usize) -> f64 {
        self.header.bounds.min_lon + col as f64 * self.lon_increment()
    }

    /// Latitude of a row's sample centers.
    pub fn lat_at(&self, row: usize) -> f64 {
        self.header.bounds.min_lat + row as f64 * self.lat_increment()
    }

    /// Longitudes of every column, west to east.
    pub fn xs(&self) -> Vec<f64> {
        (0..self.cols()).map(|c| self.lon_at(c)).collect()
    }

    /// Latitudes of every row, south to north.
    pub fn ys(&self) -> Vec<f64> {
        (0..self.rows()).map(|r| self.lat_at(r)).collect()
    }

    /// Restrict the grid to the union of `polygons`.
    ///
    /// Samples outside every polygon become no-data. An empty list excludes
    /// the whole grid.
    pub fn apply_polygons(&mut self, polygons: Vec<Polygon>) {
        let mask = polygon_mask(&self.xs(), &self.ys(), &polygons, None);
        match mask {
            PolygonMask::Disjoint => {
                debug!(
                    polygons = polygons.len(),
                    "Clip polygons miss the grid, excluding every sample"
                );
                self.raster.mask_all();
            }
            PolygonMask::Matrix { excluded, .. } => {
                self.raster.apply_mask(&excluded);
                debug!(
                    valid = self.raster.valid_count(),
                    total = self.raster.len(),
                    "Applied clip polygons"
                );
            }
        }
        self.polygons = Some(polygons);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(rows: usize, cols: usize) -> ElevationGrid {
        let header = GridHeader {
            rows,
            cols,
            bounds: TileBounds {
                min_lat: 43.0,
                max_lat: 44.0,
                min_lon: 6.0,
                max_lon: 7.0,
            },
        };
        let raster = Raster::new(rows, cols, vec![1.0; rows * cols]).unwrap();
        ElevationGrid::new(header, raster).unwrap()
    }

    #[test]
    fn test_bounds_intersects() {
        let a = TileBounds {
            min_lat: 0.0,
            max_lat: 1.0,
            min_lon: 0.0,
            max_lon: 1.0,
        };
        let touching = TileBounds {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lon: 0.5,
            max_lon: 0.7,
        };
        let apart = TileBounds {
            min_lat: 1.5,
            max_lat: 2.0,
            min_lon: 0.0,
            max_lon: 1.0,
        };
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));
        assert_eq!(a.union(&apart).max_lat, 2.0);
    }

    #[test]
    fn test_increments_and_coordinates() {
        let g = grid(1201, 1201);
        assert_relative_eq!(g.lon_increment(), 1.0 / 1200.0);
        assert_relative_eq!(g.lat_at(0), 43.0);
        assert_relative_eq!(g.lat_at(1200), 44.0, epsilon = 1e-9);
        assert_relative_eq!(g.lon_at(600), 6.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_degenerate() {
        let header = GridHeader {
            rows: 1,
            cols: 3,
            bounds: TileBounds {
                min_lat: 0.0,
                max_lat: 1.0,
                min_lon: 0.0,
                max_lon: 1.0,
            },
        };
        let raster = Raster::new(1, 3, vec![0.0; 3]).unwrap();
        assert!(ElevationGrid::new(header, raster).is_err());
    }

    #[test]
    fn test_apply_empty_polygons_excludes_all() {
        let mut g = grid(5, 5);
        g.apply_polygons(Vec::new());
        assert!(g.raster().is_fully_masked());
        assert_eq!(g.polygons().map(|p| p.len()), Some(0));
    }

    #[test]
    fn test_apply_enclosing_polygon_keeps_all() {
        let mut g = grid(5, 5);
        g.apply_polygons(vec![Polygon::new(vec![
            (5.0, 42.0),
            (8.0, 42.0),
            (8.0, 45.0),
            (5.0, 45.0),
        ])]);
        assert_eq!(g.raster().valid_count(), 25);
    }
}
