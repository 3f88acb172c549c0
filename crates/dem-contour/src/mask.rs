//! Polygon clipping masks.
//!
//! A sample is included when it lies inside, or on the boundary of, at least
//! one polygon. Each grid row is handled as a scanline: the polygon edges
//! crossing the row are intersected once, sorted, and every sample in the row
//! is classified by counting the crossings to its east.
//!
//! # Boundary rule
//!
//! An edge from `(x0, y0)` to `(x1, y1)` crosses the scanline at height `y`
//! when `min(y0, y1) < y <= max(y0, y1)`, and a sample at `x` counts the
//! crossing when `x <= x_intersection`. The consequence for samples lying
//! exactly on a polygon edge:
//!
//! - samples on the west or south boundary of a polygon are excluded,
//! - samples on the east or north boundary are included.
//!
//! A rectangle drawn exactly along the outer rows and columns of a grid thus
//! excludes the southernmost row and the westernmost column.

use crate::grid::TileBounds;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A closed ring of `(x, y)` vertices, usually `(lon, lat)`.
///
/// The ring is closed implicitly; repeating the first vertex at the end is
/// allowed and changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Polygon { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box, `None` for an empty ring.
    pub fn bounds(&self) -> Option<TileBounds> {
        let (&(x, y), rest) = self.points.split_first()?;
        let init = TileBounds {
            min_lat: y,
            max_lat: y,
            min_lon: x,
            max_lon: x,
        };
        Some(rest.iter().fold(init, |b, &(x, y)| TileBounds {
            min_lat: b.min_lat.min(y),
            max_lat: b.max_lat.max(y),
            min_lon: b.min_lon.min(x),
            max_lon: b.max_lon.max(x),
        }))
    }
}

/// Bounding box of a set of polygons.
pub fn polygons_bounds(polygons: &[Polygon]) -> Option<TileBounds> {
    polygons
        .iter()
        .filter_map(Polygon::bounds)
        .reduce(|a, b| a.union(&b))
}

/// Maps polygon vertices into grid coordinates before masking.
pub trait PointTransform: Sync {
    fn apply(&self, x: f64, y: f64) -> (f64, f64);
}

impl<F> PointTransform for F
where
    F: Fn(f64, f64) -> (f64, f64) + Sync,
{
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        self(x, y)
    }
}

/// Result of [`polygon_mask`].
#[derive(Debug, Clone, PartialEq)]
pub enum PolygonMask {
    /// No polygon touches the sample box: every sample is excluded.
    Disjoint,
    /// Per-sample exclusion flags, row-major, `rows = ys.len()`,
    /// `cols = xs.len()`; `true` means excluded.
    Matrix {
        rows: usize,
        cols: usize,
        excluded: Vec<bool>,
    },
}

impl PolygonMask {
    /// Whether a sample is excluded.
    pub fn is_excluded(&self, row: usize, col: usize) -> bool {
        match self {
            PolygonMask::Disjoint => true,
            PolygonMask::Matrix { cols, excluded, .. } => excluded[row * cols + col],
        }
    }

    /// Whether every sample is excluded.
    pub fn is_all_excluded(&self) -> bool {
        match self {
            PolygonMask::Disjoint => true,
            PolygonMask::Matrix { excluded, .. } => excluded.iter().all(|&e| e),
        }
    }
}

/// An edge with its vertical extent, ready for scanline intersection.
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    #[inline]
    fn crosses(&self, y: f64) -> bool {
        (self.y0 >= y) != (self.y1 >= y)
    }

    #[inline]
    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

struct Ring {
    edges: Vec<Edge>,
    bounds: TileBounds,
}

impl Ring {
    fn from_points(points: &[(f64, f64)]) -> Option<Ring> {
        if points.len() < 3 {
            return None;
        }
        let bounds = Polygon::new(points.to_vec()).bounds()?;
        let mut edges = Vec::with_capacity(points.len());
        for (i, &(x0, y0)) in points.iter().enumerate() {
            let (x1, y1) = points[(i + 1) % points.len()];
            // Horizontal edges never cross a scanline
            if y0 != y1 {
                edges.push(Edge { x0, y0, x1, y1 });
            }
        }
        Some(Ring { edges, bounds })
    }

    /// Sorted x coordinates where the ring crosses the scanline at `y`.
    fn crossings(&self, y: f64, out: &mut Vec<f64>) {
        out.clear();
        if y <= self.bounds.min_lat || y > self.bounds.max_lat {
            return;
        }
        out.extend(self.edges.iter().filter(|e| e.crosses(y)).map(|e| e.x_at(y)));
        out.sort_by(f64::total_cmp);
    }
}

/// Compute the exclusion mask of a sample grid against a set of polygons.
///
/// `xs` are the column coordinates and `ys` the row coordinates; the mask has
/// one row per entry of `ys`. Polygons are unioned. When no polygon's
/// bounding box touches the sample box (including when `polygons` is empty),
/// [`PolygonMask::Disjoint`] is returned without testing any sample.
pub fn polygon_mask(
    xs: &[f64],
    ys: &[f64],
    polygons: &[Polygon],
    transform: Option<&dyn PointTransform>,
) -> PolygonMask {
    let rings: Vec<Ring> = polygons
        .iter()
        .filter_map(|polygon| match transform {
            Some(t) => {
                let points: Vec<(f64, f64)> =
                    polygon.points().iter().map(|&(x, y)| t.apply(x, y)).collect();
                Ring::from_points(&points)
            }
            None => Ring::from_points(polygon.points()),
        })
        .collect();

    let Some(sample_box) = samples_bounds(xs, ys) else {
        return PolygonMask::Disjoint;
    };

    let touching: Vec<&Ring> = rings
        .iter()
        .filter(|ring| ring.bounds.intersects(&sample_box))
        .collect();
    if touching.is_empty() {
        return PolygonMask::Disjoint;
    }

    let cols = xs.len();
    let rows = ys.len();
    let excluded: Vec<bool> = ys
        .par_iter()
        .flat_map_iter(|&y| {
            let mut row = vec![true; cols];
            let mut crossings = Vec::new();
            for ring in &touching {
                ring.crossings(y, &mut crossings);
                if crossings.is_empty() {
                    continue;
                }
                for (flag, &x) in row.iter_mut().zip(xs) {
                    if *flag {
                        // Crossings with x_intersection >= x
                        let east = crossings.len() - crossings.partition_point(|&c| c < x);
                        *flag = east % 2 == 0;
                    }
                }
            }
            row
        })
        .collect();

    PolygonMask::Matrix {
        rows,
        cols,
        excluded,
    }
}

fn samples_bounds(xs: &[f64], ys: &[f64]) -> Option<TileBounds> {
    let fold = |v: &[f64]| {
        v.iter()
            .fold(None, |acc: Option<(f64, f64)>, &x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    };
    let (min_lon, max_lon) = fold(xs)?;
    let (min_lat, max_lat) = fold(ys)?;
    Some(TileBounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: bool = true;
    const F: bool = false;

    fn axis() -> Vec<f64> {
        (0..6).map(|v| v as f64).collect()
    }

    fn matrix(mask: &PolygonMask) -> Vec<Vec<bool>> {
        match mask {
            PolygonMask::Disjoint => panic!("expected a matrix"),
            PolygonMask::Matrix { rows, cols, excluded } => {
                (0..*rows).map(|r| excluded[r * cols..(r + 1) * cols].to_vec()).collect()
            }
        }
    }

    fn polygon(points: &[(f64, f64)]) -> Polygon {
        Polygon::new(points.to_vec())
    }

    #[test]
    fn test_mask_exact_border() {
        let full = polygon(&[(0.0, 0.0), (0.0, 5.0), (5.0, 5.0), (5.0, 0.0), (0.0, 0.0)]);
        let mask = polygon_mask(&axis(), &axis(), &[full], None);
        assert_eq!(
            matrix(&mask),
            vec![
                vec![T, T, T, T, T, T],
                vec![T, F, F, F, F, F],
                vec![T, F, F, F, F, F],
                vec![T, F, F, F, F, F],
                vec![T, F, F, F, F, F],
                vec![T, F, F, F, F, F],
            ]
        );
    }

    #[test]
    fn test_mask_enclosing_polygon() {
        let bigger = polygon(&[(-1.0, -1.0), (-1.0, 6.0), (6.0, 6.0), (6.0, -1.0)]);
        let mask = polygon_mask(&axis(), &axis(), &[bigger], None);
        assert_eq!(matrix(&mask), vec![vec![F; 6]; 6]);
    }

    #[test]
    fn test_mask_split() {
        let split = polygon(&[(-1.0, -1.0), (-1.0, 6.0), (2.0, 6.0), (5.0, -1.0), (-1.0, -1.0)]);
        let mask = polygon_mask(&axis(), &axis(), &[split], None);
        assert_eq!(
            matrix(&mask),
            vec![
                vec![F, F, F, F, F, T],
                vec![F, F, F, F, F, T],
                vec![F, F, F, F, T, T],
                vec![F, F, F, F, T, T],
                vec![F, F, F, T, T, T],
                vec![F, F, F, T, T, T],
            ]
        );
    }

    #[test]
    fn test_mask_multiple_regions() {
        let multi = polygon(&[
            (-1.0, -1.0),
            (-1.0, 2.5),
            (2.5, 2.5),
            (2.5, -1.0),
            (4.5, -1.0),
            (4.5, 6.0),
            (6.0, 6.0),
            (6.0, -1.0),
            (-1.0, -1.0),
        ]);
        let mask = polygon_mask(&axis(), &axis(), &[multi], None);
        assert_eq!(
            matrix(&mask),
            vec![
                vec![F, F, F, T, T, F],
                vec![F, F, F, T, T, F],
                vec![F, F, F, T, T, F],
                vec![T, T, T, T, T, F],
                vec![T, T, T, T, T, F],
                vec![T, T, T, T, T, F],
            ]
        );
    }

    #[test]
    fn test_mask_disjoint() {
        let out = polygon(&[(-1.0, -1.0), (-1.0, -2.0), (6.0, -2.0), (6.0, -1.0), (-1.0, -1.0)]);
        let mask = polygon_mask(&axis(), &axis(), &[out], None);
        assert_eq!(mask, PolygonMask::Disjoint);
        assert!(mask.is_all_excluded());

        assert_eq!(polygon_mask(&axis(), &axis(), &[], None), PolygonMask::Disjoint);
    }

    #[test]
    fn test_mask_union_of_polygons() {
        let west = polygon(&[(-1.0, -1.0), (1.5, -1.0), (1.5, 6.0), (-1.0, 6.0)]);
        let east = polygon(&[(3.5, -1.0), (6.0, -1.0), (6.0, 6.0), (3.5, 6.0)]);
        let mask = polygon_mask(&axis(), &axis(), &[west, east], None);
        for row in matrix(&mask) {
            assert_eq!(row, vec![F, F, T, T, F, F]);
        }
    }

    #[test]
    fn test_mask_non_square_shape() {
        let xs = vec![0.0, 1.0, 2.0];
        let ys = vec![0.0, 1.0];
        let bigger = polygon(&[(-1.0, -1.0), (-1.0, 6.0), (6.0, 6.0), (6.0, -1.0)]);
        match polygon_mask(&xs, &ys, &[bigger], None) {
            PolygonMask::Matrix { rows, cols, excluded } => {
                assert_eq!((rows, cols), (2, 3));
                assert_eq!(excluded.len(), 6);
            }
            PolygonMask::Disjoint => panic!("expected a matrix"),
        }
    }

    #[test]
    fn test_mask_with_transform() {
        // Polygon expressed in tenths, mapped back into grid units
        let scaled = polygon(&[(-10.0, -10.0), (-10.0, 60.0), (60.0, 60.0), (60.0, -10.0)]);
        let to_grid = |x: f64, y: f64| (x / 10.0, y / 10.0);
        let mask = polygon_mask(&axis(), &axis(), &[scaled], Some(&to_grid));
        assert_eq!(matrix(&mask), vec![vec![F; 6]; 6]);
    }

    #[test]
    fn test_polygon_bounds() {
        let p = polygon(&[(1.0, 2.0), (3.0, -1.0), (0.5, 4.0)]);
        let b = p.bounds().unwrap();
        assert_eq!((b.min_lon, b.min_lat, b.max_lon, b.max_lat), (0.5, -1.0, 3.0, 4.0));
        assert!(Polygon::new(Vec::new()).bounds().is_none());
    }
}
