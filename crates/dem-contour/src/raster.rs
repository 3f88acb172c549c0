//! Row-major elevation samples with a parallel no-data mask.

use crate::{DemError, Result};
use rayon::prelude::*;

/// A rectangular matrix of elevation samples.
///
/// Row 0 is the southernmost row. Every sample carries a validity flag in a
/// parallel `no_data` vector; a masked sample keeps whatever raw value the file
/// held but is ignored by statistics and contouring.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
    no_data: Vec<bool>,
}

impl Raster {
    /// Build a raster with every sample valid.
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        let no_data = vec![false; values.len()];
        Self::with_mask(rows, cols, values, no_data)
    }

    /// Build a raster with an explicit no-data mask.
    pub fn with_mask(rows: usize, cols: usize, values: Vec<f32>, no_data: Vec<bool>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(DemError::InvalidOption(format!(
                "raster must have at least one sample, got {} x {}",
                rows, cols
            )));
        }
        if values.len() != rows * cols || no_data.len() != values.len() {
            return Err(DemError::InvalidOption(format!(
                "raster of {} x {} needs {} samples, got {} values and {} mask entries",
                rows,
                cols,
                rows * cols,
                values.len(),
                no_data.len()
            )));
        }
        Ok(Raster {
            rows,
            cols,
            values,
            no_data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Valid elevation at a sample, `None` when masked.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        let idx = self.index(row, col);
        if self.no_data[idx] {
            None
        } else {
            Some(self.values[idx])
        }
    }

    /// Raw stored value, ignoring the mask.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f32 {
        self.values[self.index(row, col)]
    }

    #[inline]
    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        self.no_data[self.index(row, col)]
    }

    pub fn set_masked(&mut self, row: usize, col: usize) {
        let idx = self.index(row, col);
        self.no_data[idx] = true;
    }

    /// Mask every sample for which `predicate` returns true.
    pub fn mask_where<F: Fn(f32) -> bool>(&mut self, predicate: F) {
        for (flag, &v) in self.no_data.iter_mut().zip(&self.values) {
            *flag |= predicate(v);
        }
    }

    /// OR a congruent exclusion matrix into the mask.
    pub fn apply_mask(&mut self, excluded: &[bool]) {
        debug_assert_eq!(excluded.len(), self.no_data.len());
        for (flag, &ex) in self.no_data.iter_mut().zip(excluded) {
            *flag |= ex;
        }
    }

    /// Mask every sample.
    pub fn mask_all(&mut self) {
        self.no_data.iter_mut().for_each(|f| *f = true);
    }

    /// Multiply every stored value by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn no_data(&self) -> &[bool] {
        &self.no_data
    }

    /// Number of valid samples.
    pub fn valid_count(&self) -> usize {
        self.no_data.iter().filter(|&&m| !m).count()
    }

    pub fn is_fully_masked(&self) -> bool {
        self.no_data.iter().all(|&m| m)
    }

    /// Minimum and maximum over valid samples.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .zip(&self.no_data)
            .filter(|(_, &masked)| !masked)
            .map(|(&v, _)| v)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Owned copy of a rectangular region.
    pub fn sub_region(&self, row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Raster {
        debug_assert!(row_offset + rows <= self.rows && col_offset + cols <= self.cols);

        let mut values = Vec::with_capacity(rows * cols);
        let mut no_data = Vec::with_capacity(rows * cols);
        for row in row_offset..row_offset + rows {
            let start = self.index(row, col_offset);
            values.extend_from_slice(&self.values[start..start + cols]);
            no_data.extend_from_slice(&self.no_data[start..start + cols]);
        }

        Raster {
            rows,
            cols,
            values,
            no_data,
        }
    }

    /// Upsample by an integer factor with Catmull-Rom bicubic interpolation.
    ///
    /// The result has `(rows - 1) * ratio + 1` rows (columns likewise), so
    /// corner samples keep their positions. An output sample is masked when
    /// any corner of the source cell enclosing it is masked; masked
    /// neighbours outside that cell are left out of the weighted sum.
    pub fn upsample(&self, ratio: usize) -> Raster {
        if ratio <= 1 || self.rows < 2 || self.cols < 2 {
            return self.clone();
        }

        let out_rows = (self.rows - 1) * ratio + 1;
        let out_cols = (self.cols - 1) * ratio + 1;

        let rows: Vec<(Vec<f32>, Vec<bool>)> = (0..out_rows)
            .into_par_iter()
            .map(|out_row| {
                let mut values = Vec::with_capacity(out_cols);
                let mut no_data = Vec::with_capacity(out_cols);
                let (r0, fy) = split_position(out_row, ratio, self.rows);
                for out_col in 0..out_cols {
                    let (c0, fx) = split_position(out_col, ratio, self.cols);
                    match self.bicubic(r0, c0, fy, fx) {
                        Some(v) => {
                            values.push(v);
                            no_data.push(false);
                        }
                        None => {
                            values.push(self.value(r0, c0));
                            no_data.push(true);
                        }
                    }
                }
                (values, no_data)
            })
            .collect();

        let mut values = Vec::with_capacity(out_rows * out_cols);
        let mut no_data = Vec::with_capacity(out_rows * out_cols);
        for (v, m) in rows {
            values.extend(v);
            no_data.extend(m);
        }

        Raster {
            rows: out_rows,
            cols: out_cols,
            values,
            no_data,
        }
    }

    fn bicubic(&self, r0: usize, c0: usize, fy: f64, fx: f64) -> Option<f32> {
        // A sample sitting on a source row or column only depends on that line.
        let r1 = if fy > 0.0 { (r0 + 1).min(self.rows - 1) } else { r0 };
        let c1 = if fx > 0.0 { (c0 + 1).min(self.cols - 1) } else { c0 };
        if self.is_masked(r0, c0)
            || self.is_masked(r0, c1)
            || self.is_masked(r1, c0)
            || self.is_masked(r1, c1)
        {
            return None;
        }

        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;

        let mut sum = 0.0f64;
        let mut weight_sum = 0.0f64;
        for dy in -1..=2isize {
            let row = clamp(r0 as isize + dy, self.rows);
            let wy = catmull_rom_weight(dy as f64 - fy);
            for dx in -1..=2isize {
                let col = clamp(c0 as isize + dx, self.cols);
                if let Some(v) = self.get(row, col) {
                    let w = wy * catmull_rom_weight(dx as f64 - fx);
                    sum += v as f64 * w;
                    weight_sum += w;
                }
            }
        }

        if weight_sum.abs() < f64::EPSILON {
            return self.get(r0, c0);
        }
        Some((sum / weight_sum) as f32)
    }
}

/// Source sample index and fractional offset for an upsampled position.
fn split_position(out: usize, ratio: usize, n: usize) -> (usize, f64) {
    let base = (out / ratio).min(n - 1);
    let frac = (out - base * ratio) as f64 / ratio as f64;
    (base, frac)
}

/// Catmull-Rom cubic kernel (a = -0.5). Interpolating: 1 at 0, 0 at ±1 and ±2.
#[inline(always)]
fn catmull_rom_weight(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        1.5 * x * x * x - 2.5 * x * x + 1.0
    } else if x < 2.0 {
        -0.5 * x * x * x + 2.5 * x * x - 4.0 * x + 2.0
    } else {
        0.0
    }
}
