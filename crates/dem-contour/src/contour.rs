//! Contour line extraction with marching squares.
//!
//! Cells are the squares between four neighbouring samples. A corner is
//! "above" a level when its value is `>= level`; the 4-bit case index is
//! built as `bl = 1`, `br = 2`, `tr = 4`, `tl = 8`, where "top" is the
//! northern row. Cells touching a masked sample produce no segment, so lines
//! stop at the edge of no-data regions.
//!
//! Saddle cells (cases 5 and 10) are resolved with the mean of the four
//! corners: if the mean is above the level the two high corners stay
//! connected through the cell, otherwise the two low corners do.
//!
//! Segments from neighbouring cells share the crossing point on their
//! common cell edge and are chained through it. Open lines are emitted first,
//! starting from their free end, then closed rings, which repeat their first
//! vertex at the end.

use crate::simplify::simplify;
use crate::tiling::Tile;
use crate::{DemError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// A traced contour line in `(lon, lat)` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<(f64, f64)>,
    /// First and last vertex coincide.
    pub closed: bool,
}

impl Polyline {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Every polyline of one elevation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourLevel {
    pub elevation: f64,
    pub lines: Vec<Polyline>,
}

/// Contours of a tile, ascending by elevation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourSet {
    pub levels: Vec<ContourLevel>,
}

impl ContourSet {
    /// Total number of polylines over all levels.
    pub fn line_count(&self) -> usize {
        self.levels.iter().map(|l| l.lines.len()).sum()
    }

    /// Total number of vertices over all levels.
    pub fn vertex_count(&self) -> usize {
        self.levels
            .iter()
            .flat_map(|l| &l.lines)
            .map(Polyline::len)
            .sum()
    }
}

/// Levels `0, step, 2 * step, ...` strictly below `max`.
pub fn contour_levels(step: f64, max: Option<f32>) -> Result<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(DemError::InvalidOption(format!(
            "contour step must be positive, got {}",
            step
        )));
    }
    let Some(max) = max else {
        return Ok(Vec::new());
    };
    let max = max as f64;
    Ok((0u64..)
        .map(|k| k as f64 * step)
        .take_while(|&level| level < max)
        .collect())
}

/// Traces the contour lines of one tile.
#[derive(Debug)]
pub struct ContourTracer<'a> {
    tile: &'a Tile,
    levels: Vec<f64>,
    rdp_epsilon: Option<f64>,
}

impl<'a> ContourTracer<'a> {
    /// Prepare tracing of `tile` every `step` units of elevation.
    pub fn new(tile: &'a Tile, step: f64, rdp_epsilon: Option<f64>) -> Result<Self> {
        let levels = contour_levels(step, tile.min_max().map(|(_, max)| max))?;
        Ok(ContourTracer {
            tile,
            levels,
            rdp_epsilon: rdp_epsilon.filter(|&e| e > 0.0),
        })
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Polylines at one elevation.
    pub fn trace(&self, level: f64) -> Vec<Polyline> {
        let mut builder = SegmentBuilder::new(self.tile, level);
        builder.march();
        let lines = builder.assemble();

        let lines: Vec<Polyline> = match self.rdp_epsilon {
            Some(epsilon) => lines
                .into_iter()
                .map(|line| Polyline {
                    points: simplify(&line.points, epsilon),
                    closed: line.closed,
                })
                // A ring needs three distinct vertices plus the repeated first
                .filter(|line| !line.closed || line.points.len() >= 4)
                .collect(),
            None => lines,
        };

        trace!(level, lines = lines.len(), "Traced contour level");
        lines
    }

    /// Every level, traced in parallel and returned in ascending order.
    pub fn trace_all(&self) -> ContourSet {
        let levels = self
            .levels
            .par_iter()
            .map(|&elevation| ContourLevel {
                elevation,
                lines: self.trace(elevation),
            })
            .collect();
        ContourSet { levels }
    }
}

/// Cell edges are identified by their lower-left sample and orientation.
type EdgeId = u64;

#[derive(Debug, Clone, Copy)]
enum Side {
    Bottom,
    Right,
    Top,
    Left,
}

struct SegmentBuilder<'a> {
    tile: &'a Tile,
    level: f64,
    /// Segments as pairs of edges, in creation order.
    segments: Vec<(EdgeId, EdgeId)>,
    /// Crossing point on each edge used by a segment.
    points: HashMap<EdgeId, (f64, f64)>,
}

impl<'a> SegmentBuilder<'a> {
    fn new(tile: &'a Tile, level: f64) -> Self {
        SegmentBuilder {
            tile,
            level,
            segments: Vec::new(),
            points: HashMap::new(),
        }
    }

    fn horizontal(&self, row: usize, col: usize) -> EdgeId {
        ((row * self.tile.cols() + col) as u64) << 1
    }

    fn vertical(&self, row: usize, col: usize) -> EdgeId {
        (((row * self.tile.cols() + col) as u64) << 1) | 1
    }

    fn march(&mut self) {
        let tile = self.tile;
        let raster = tile.raster();
        let (rows, cols) = (raster.rows(), raster.cols());
        if rows < 2 || cols < 2 {
            return;
        }

        for row in 0..rows - 1 {
            for col in 0..cols - 1 {
                let (Some(bl), Some(br), Some(tr), Some(tl)) = (
                    raster.get(row, col),
                    raster.get(row, col + 1),
                    raster.get(row + 1, col + 1),
                    raster.get(row + 1, col),
                ) else {
                    continue;
                };
                let corners = [bl as f64, br as f64, tr as f64, tl as f64];
                let [bl, br, tr, tl] = corners;

                let level = self.level;
                let case = (bl >= level) as u8
                    | ((br >= level) as u8) << 1
                    | ((tr >= level) as u8) << 2
                    | ((tl >= level) as u8) << 3;

                use Side::*;
                let high_connected = || (bl + br + tr + tl) / 4.0 >= level;
                match case {
                    0 | 15 => {}
                    1 | 14 => self.add(row, col, &corners, Left, Bottom),
                    2 | 13 => self.add(row, col, &corners, Bottom, Right),
                    3 | 12 => self.add(row, col, &corners, Left, Right),
                    4 | 11 => self.add(row, col, &corners, Right, Top),
                    6 | 9 => self.add(row, col, &corners, Bottom, Top),
                    7 | 8 => self.add(row, col, &corners, Left, Top),
                    5 => {
                        // bl and tr high
                        if high_connected() {
                            self.add(row, col, &corners, Bottom, Right);
                            self.add(row, col, &corners, Top, Left);
                        } else {
                            self.add(row, col, &corners, Left, Bottom);
                            self.add(row, col, &corners, Right, Top);
                        }
                    }
                    10 => {
                        // br and tl high
                        if high_connected() {
                            self.add(row, col, &corners, Left, Bottom);
                            self.add(row, col, &corners, Right, Top);
                        } else {
                            self.add(row, col, &corners, Bottom, Right);
                            self.add(row, col, &corners, Top, Left);
                        }
                    }
                    _ => unreachable!("case index is four bits"),
                }
            }
        }
    }

    fn add(&mut self, row: usize, col: usize, corners: &[f64; 4], a: Side, b: Side) {
        let ea = self.crossing(row, col, corners, a);
        let eb = self.crossing(row, col, corners, b);
        self.segments.push((ea, eb));
    }

    /// Register the crossing point on one side of a cell and return its edge.
    fn crossing(&mut self, row: usize, col: usize, corners: &[f64; 4], side: Side) -> EdgeId {
        let [bl, br, tr, tl] = *corners;
        let (edge, (r0, c0, v0), (r1, c1, v1)) = match side {
            Side::Bottom => (self.horizontal(row, col), (row, col, bl), (row, col + 1, br)),
            Side::Top => (
                self.horizontal(row + 1, col),
                (row + 1, col, tl),
                (row + 1, col + 1, tr),
            ),
            Side::Left => (self.vertical(row, col), (row, col, bl), (row + 1, col, tl)),
            Side::Right => (
                self.vertical(row, col + 1),
                (row, col + 1, br),
                (row + 1, col + 1, tr),
            ),
        };

        let tile = self.tile;
        let level = self.level;
        self.points.entry(edge).or_insert_with(|| {
            let t = if v1 == v0 { 0.5 } else { (level - v0) / (v1 - v0) };
            let (x0, y0) = (tile.lon_at(c0), tile.lat_at(r0));
            let (x1, y1) = (tile.lon_at(c1), tile.lat_at(r1));
            (x0 + t * (x1 - x0), y0 + t * (y1 - y0))
        });
        edge
    }

    /// Chain segments sharing an edge into polylines.
    fn assemble(self) -> Vec<Polyline> {
        let mut by_edge: HashMap<EdgeId, Vec<usize>> = HashMap::new();
        for (i, &(a, b)) in self.segments.iter().enumerate() {
            by_edge.entry(a).or_default().push(i);
            by_edge.entry(b).or_default().push(i);
        }

        let mut used = vec![false; self.segments.len()];
        let mut lines = Vec::new();

        // Open lines, from whichever end is free
        for (i, &(a, b)) in self.segments.iter().enumerate() {
            if used[i] {
                continue;
            }
            let start = if by_edge[&a].len() == 1 {
                a
            } else if by_edge[&b].len() == 1 {
                b
            } else {
                continue;
            };
            lines.push(self.walk(i, start, &by_edge, &mut used));
        }

        // What remains are closed rings
        for i in 0..self.segments.len() {
            if !used[i] {
                let start = self.segments[i].0;
                lines.push(self.walk(i, start, &by_edge, &mut used));
            }
        }

        lines
    }

    fn walk(
        &self,
        first: usize,
        start: EdgeId,
        by_edge: &HashMap<EdgeId, Vec<usize>>,
        used: &mut [bool],
    ) -> Polyline {
        let mut points = vec![self.points[&start]];
        let mut segment = first;
        let mut edge = start;

        loop {
            used[segment] = true;
            let (a, b) = self.segments[segment];
            edge = if a == edge { b } else { a };
            points.push(self.points[&edge]);

            match by_edge[&edge].iter().find(|&&s| !used[s]) {
                Some(&next) => segment = next,
                None => break,
            }
        }

        Polyline {
            closed: edge == start && points.len() > 2,
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ElevationGrid, GridHeader, TileBounds};
    use crate::raster::Raster;
    use crate::tiling::TilingOptions;
    use approx::assert_relative_eq;

    /// Single tile over `[0, cols-1] x [0, rows-1]`; `f(row, col)` with row 0 south.
    fn tile(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f32) -> Tile {
        let header = GridHeader {
            rows,
            cols,
            bounds: TileBounds {
                min_lat: 0.0,
                max_lat: (rows - 1) as f64,
                min_lon: 0.0,
                max_lon: (cols - 1) as f64,
            },
        };
        let values = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
        let grid = ElevationGrid::new(header, Raster::new(rows, cols, values).unwrap()).unwrap();
        grid.make_tiles(&TilingOptions::default())
            .unwrap()
            .remove(0)
    }

    fn peak(rows: usize, cols: usize) -> Tile {
        let (cr, cc) = ((rows / 2) as f32, (cols / 2) as f32);
        tile(rows, cols, move |r, c| {
            let d = ((r as f32 - cr).powi(2) + (c as f32 - cc).powi(2)).sqrt();
            100.0 - 10.0 * d
        })
    }

    #[test]
    fn test_levels() {
        assert_eq!(
            contour_levels(20.0, Some(95.0)).unwrap(),
            vec![0.0, 20.0, 40.0, 60.0, 80.0]
        );
        // Strictly below the maximum
        assert_eq!(contour_levels(20.0, Some(80.0)).unwrap(), vec![0.0, 20.0, 40.0, 60.0]);
        assert!(contour_levels(20.0, Some(-5.0)).unwrap().is_empty());
        assert!(contour_levels(20.0, None).unwrap().is_empty());
        assert!(matches!(
            contour_levels(0.0, Some(10.0)),
            Err(DemError::InvalidOption(_))
        ));
        assert!(contour_levels(-1.0, Some(10.0)).is_err());
    }

    #[test]
    fn test_single_peak_gives_closed_ring() {
        let t = peak(21, 21);
        let (levels, tracer) = t.contour_lines(25.0, None).unwrap();
        assert_eq!(levels, vec![0.0, 25.0, 50.0, 75.0]);

        let lines = tracer.trace(50.0);
        assert_eq!(lines.len(), 1);
        let ring = &lines[0];
        assert!(ring.closed);
        assert_eq!(ring.points.first(), ring.points.last());

        // Every vertex lies on the level's circle, within interpolation error
        for &(x, y) in &ring.points {
            let d = ((x - 10.0).powi(2) + (y - 10.0).powi(2)).sqrt();
            assert!((d - 5.0).abs() < 0.2, "vertex ({}, {}) at distance {}", x, y, d);
        }
    }

    #[test]
    fn test_ramp_gives_open_line() {
        // Elevation grows eastwards: one straight north-south line per level
        let t = tile(5, 6, |_, c| c as f32 * 10.0);
        let (levels, tracer) = t.contour_lines(15.0, None).unwrap();
        assert_eq!(levels, vec![0.0, 15.0, 30.0, 45.0]);

        let lines = tracer.trace(15.0);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(!line.closed);
        assert_eq!(line.points.len(), 5);
        for &(x, _) in &line.points {
            assert_relative_eq!(x, 1.5);
        }
        // Starts at a free end on the grid border
        let (_, y0) = line.points[0];
        let (_, y1) = *line.points.last().unwrap();
        assert_relative_eq!((y1 - y0).abs(), 4.0);
    }

    #[test]
    fn test_masked_cells_break_lines() {
        let header = GridHeader {
            rows: 5,
            cols: 4,
            bounds: TileBounds {
                min_lat: 0.0,
                max_lat: 4.0,
                min_lon: 0.0,
                max_lon: 3.0,
            },
        };
        let values: Vec<f32> = (0..20).map(|i| (i % 4) as f32 * 10.0).collect();
        let mut no_data = vec![false; 20];
        // Mask a sample in the middle row, west of the line
        no_data[2 * 4 + 1] = true;
        let raster = Raster::with_mask(5, 4, values, no_data).unwrap();
        let grid = ElevationGrid::new(header, raster).unwrap();
        let t = grid.make_tiles(&TilingOptions::default()).unwrap().remove(0);

        let (_, tracer) = t.contour_lines(15.0, None).unwrap();
        let lines = tracer.trace(15.0);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.closed && l.points.len() == 2));
    }

    #[test]
    fn test_saddle_resolution() {
        // 2x2 saddle: bl and tr high
        let high = |mean_high: bool| {
            let low = if mean_high { 8.0 } else { 0.0 };
            tile(2, 2, move |r, c| if r == c { 10.0 } else { low })
        };

        // Mean above the level: high corners connected, low corners cut off
        let t = high(true);
        let (_, tracer) = t.contour_lines(5.0, None).unwrap();
        let lines = tracer.trace(9.0);
        assert_eq!(lines.len(), 2);
        let mut corners: Vec<(f64, f64)> = lines
            .iter()
            .map(|l| {
                let (x, y) = l.points.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
                (x / l.points.len() as f64, y / l.points.len() as f64)
            })
            .collect();
        corners.sort_by(|a, b| a.0.total_cmp(&b.0));
        // Lines hug the low corners br (1, 0) and tl (0, 1)
        assert!(corners[0].0 < 0.5 && corners[0].1 > 0.5);
        assert!(corners[1].0 > 0.5 && corners[1].1 < 0.5);

        // Mean below the level: lines hug the high corners bl (0, 0) and tr (1, 1)
        let t = high(false);
        let (_, tracer) = t.contour_lines(5.0, None).unwrap();
        let lines = tracer.trace(6.0);
        assert_eq!(lines.len(), 2);
        let mut centers: Vec<(f64, f64)> = lines
            .iter()
            .map(|l| ((l.points[0].0 + l.points[1].0) / 2.0, (l.points[0].1 + l.points[1].1) / 2.0))
            .collect();
        centers.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert!(centers[0].0 < 0.5 && centers[0].1 < 0.5);
        assert!(centers[1].0 > 0.5 && centers[1].1 > 0.5);
    }

    #[test]
    fn test_simplification_reduces_vertices() {
        let t = peak(41, 41);
        let (_, full) = t.contour_lines(20.0, None).unwrap();
        let (_, zero) = t.contour_lines(20.0, Some(0.0)).unwrap();
        let (_, simplified) = t.contour_lines(20.0, Some(0.5)).unwrap();

        let full = full.trace_all();
        assert_eq!(full, zero.trace_all());
        let simplified = simplified.trace_all();
        assert_eq!(full.levels.len(), simplified.levels.len());
        assert!(simplified.vertex_count() < full.vertex_count());
        for (a, b) in full.levels.iter().zip(&simplified.levels) {
            assert_eq!(a.lines.len(), b.lines.len());
            for (la, lb) in a.lines.iter().zip(&b.lines) {
                assert!(lb.len() <= la.len());
                assert_eq!(la.points.first(), lb.points.first());
            }
        }
    }

    #[test]
    fn test_simplification_drops_collapsed_rings() {
        let t = tile(3, 3, |r, c| if r == 1 && c == 1 { 10.0 } else { 0.0 });

        let (_, full) = t.contour_lines(5.0, None).unwrap();
        let lines = full.trace(5.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert_eq!(lines[0].points.len(), 5);

        // Every vertex lies within epsilon of the first one
        let (_, coarse) = t.contour_lines(5.0, Some(5.0)).unwrap();
        assert!(coarse.trace(5.0).is_empty());
        assert_eq!(coarse.trace_all().line_count(), 0);
    }

    #[test]
    fn test_trace_all_in_level_order() {
        let t = peak(21, 21);
        let (levels, tracer) = t.contour_lines(10.0, None).unwrap();
        let set = tracer.trace_all();
        let elevations: Vec<f64> = set.levels.iter().map(|l| l.elevation).collect();
        assert_eq!(elevations, levels);
        assert!(set.levels.iter().skip(1).all(|l| !l.lines.is_empty()));
    }
}
