//! Elevation file decoding.
//!
//! Two formats are understood:
//!
//! - raw SRTM `.hgt` grids: square, big-endian `i16`, north row first, with
//!   the georeference implied by the file name (`N43E006.hgt`) and the file
//!   size (1201 samples per side for 3 arc-second data, 3601 for 1 arc-second);
//! - GeoTIFF (`.tif`, `.tiff`) with ModelTiepoint / ModelPixelScale tags, or
//!   a tile id in the file name when those tags are missing.
//!
//! Grids are returned with row 0 at the south edge.

use crate::grid::{ElevationGrid, GridHeader, TileBounds};
use crate::raster::Raster;
use crate::tile_id::TileId;
use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, trace};

/// SRTM void marker.
pub const SRTM_VOID: i16 = -32768;

/// Samples per side of 3 arc-second and 1 arc-second 1x1 degree cells.
const NOMINAL_SIDES: [usize; 2] = [1201, 3601];

const FEET_PER_METER: f32 = 3.280_839_9;

// GeoTIFF tags
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GDAL_NODATA: u16 = 42113;

/// Unit of the elevations handed to the contour generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationUnit {
    #[default]
    Meters,
    Feet,
}

impl FromStr for ElevationUnit {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" => Ok(ElevationUnit::Meters),
            "ft" | "feet" => Ok(ElevationUnit::Feet),
            other => Err(DemError::InvalidOption(format!(
                "unknown elevation unit '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ElevationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationUnit::Meters => write!(f, "meters"),
            ElevationUnit::Feet => write!(f, "feet"),
        }
    }
}

/// How a file is turned into an [`ElevationGrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Extra sample columns stored beyond each east/west edge of the cell.
    pub extra_border_lon: usize,
    /// Extra sample rows stored beyond each north/south edge of the cell.
    pub extra_border_lat: usize,
    /// Integer upsampling factor; 1 disables smoothing.
    pub smooth_ratio: usize,
    /// Samples at or below this value are treated as voids.
    pub void_range_max: Option<f32>,
    pub unit: ElevationUnit,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            extra_border_lon: 0,
            extra_border_lat: 0,
            smooth_ratio: 1,
            void_range_max: None,
            unit: ElevationUnit::Meters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Hgt,
    GeoTiff,
}

impl FileKind {
    fn of(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("hgt") => Ok(FileKind::Hgt),
            Some("tif") | Some("tiff") => Ok(FileKind::GeoTiff),
            _ => Err(DemError::file_format(path, "unsupported file extension")),
        }
    }
}

impl ElevationGrid {
    /// Load an elevation grid from a `.hgt` or GeoTIFF file.
    pub fn from_file<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        if options.smooth_ratio == 0 {
            return Err(DemError::InvalidOption(
                "smooth ratio must be at least 1".to_string(),
            ));
        }

        let (header, mut raster) = match FileKind::of(path)? {
            FileKind::Hgt => read_hgt(path, options)?,
            FileKind::GeoTiff => read_geotiff(path, options)?,
        };

        if let Some(max) = options.void_range_max {
            raster.mask_where(|v| v <= max);
        }
        if options.unit == ElevationUnit::Feet {
            raster.scale(FEET_PER_METER);
        }

        let (header, raster) = if options.smooth_ratio > 1 {
            let raster = raster.upsample(options.smooth_ratio);
            let header = GridHeader {
                rows: raster.rows(),
                cols: raster.cols(),
                bounds: header.bounds,
            };
            debug!(
                ratio = options.smooth_ratio,
                rows = header.rows,
                cols = header.cols,
                "Smoothed elevation grid"
            );
            (header, raster)
        } else {
            (header, raster)
        };

        debug!(
            path = %path.display(),
            rows = header.rows,
            cols = header.cols,
            min_lon = header.bounds.min_lon,
            min_lat = header.bounds.min_lat,
            max_lon = header.bounds.max_lon,
            max_lat = header.bounds.max_lat,
            "Loaded elevation grid"
        );

        ElevationGrid::new(header, raster)
    }
}

/// Dimensions and bounds of a file, without decoding its samples.
///
/// Smoothing is not taken into account: the header describes the file.
pub fn probe<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<GridHeader> {
    let path = path.as_ref();
    match FileKind::of(path)? {
        FileKind::Hgt => {
            let len = std::fs::metadata(path)?.len() as usize;
            hgt_header(path, len, options)
        }
        FileKind::GeoTiff => {
            let mut decoder = open_tiff(path)?;
            tiff_header(&mut decoder, path, options)
        }
    }
}

/// Union of the bounds of every file, `None` for an empty list.
pub fn covered_area<I, P>(files: I, options: &LoadOptions) -> Result<Option<TileBounds>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut area: Option<TileBounds> = None;
    for file in files {
        let bounds = probe(file, options)?.bounds;
        area = Some(match area {
            Some(a) => a.union(&bounds),
            None => bounds,
        });
    }
    Ok(area)
}

// ============================================================================
// Raw .hgt
// ============================================================================

fn hgt_header(path: &Path, len: usize, options: &LoadOptions) -> Result<GridHeader> {
    if len == 0 || len % 2 != 0 {
        return Err(DemError::file_format(path, format!("odd file size {}", len)));
    }
    let samples = len / 2;
    let side = (samples as f64).sqrt().round() as usize;
    if side * side != samples {
        return Err(DemError::file_format(
            path,
            format!("{} samples do not form a square grid", samples),
        ));
    }

    let nominal = |border: usize| side.checked_sub(2 * border).filter(|n| NOMINAL_SIDES.contains(n));
    let (Some(nominal_lon), Some(nominal_lat)) =
        (nominal(options.extra_border_lon), nominal(options.extra_border_lat))
    else {
        return Err(DemError::file_format(
            path,
            format!(
                "{} samples per side does not match a 1 or 3 arc-second cell with borders ({}, {})",
                side, options.extra_border_lon, options.extra_border_lat
            ),
        ));
    };

    let tile = tile_id_of(path)?;
    Ok(GridHeader {
        rows: side,
        cols: side,
        bounds: cell_bounds(
            tile,
            side,
            side,
            1.0 / (nominal_lon - 1) as f64,
            1.0 / (nominal_lat - 1) as f64,
            options,
        ),
    })
}

fn read_hgt(path: &Path, options: &LoadOptions) -> Result<(GridHeader, Raster)> {
    let bytes = std::fs::read(path)?;
    let header = hgt_header(path, bytes.len(), options)?;
    let side = header.cols;

    // Files store the north row first
    let mut values = vec![0.0f32; side * side];
    for (file_row, chunk) in bytes.chunks_exact(2 * side).enumerate() {
        let row = side - 1 - file_row;
        let out = &mut values[row * side..(row + 1) * side];
        for (v, pair) in out.iter_mut().zip(chunk.chunks_exact(2)) {
            *v = i16::from_be_bytes([pair[0], pair[1]]) as f32;
        }
    }

    let mut raster = Raster::new(side, side, values)?;
    raster.mask_where(|v| v <= SRTM_VOID as f32);
    trace!(path = %path.display(), voids = raster.len() - raster.valid_count(), "Decoded hgt samples");

    Ok((header, raster))
}

// ============================================================================
// GeoTIFF
// ============================================================================

fn open_tiff(path: &Path) -> Result<Decoder<std::io::BufReader<std::fs::File>>> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    let decoder = Decoder::new(file).map_err(|e| DemError::file_format(path, e.to_string()))?;

    // 1 arc-second tiles with borders approach 13 million samples
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    Ok(decoder.with_limits(limits))
}

fn tiff_header<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    options: &LoadOptions,
) -> Result<GridHeader> {
    let (width, height) = decoder.dimensions()?;
    let (cols, rows) = (width as usize, height as usize);
    if cols < 2 || rows < 2 {
        return Err(DemError::file_format(
            path,
            format!("{} x {} raster is too small", rows, cols),
        ));
    }

    let tiepoint = decoder.get_tag_f64_vec(geotiff_tag(TAG_MODEL_TIEPOINT));
    let pixel_scale = decoder.get_tag_f64_vec(geotiff_tag(TAG_MODEL_PIXEL_SCALE));

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 && scale[0] > 0.0 && scale[1] > 0.0 {
            // Tiepoint [i, j, k, x, y, z] anchors raster corner (i, j) to (x, y).
            // Pixels are areas, so the first sample center sits half a pixel in.
            let (scale_x, scale_y) = (scale[0], scale[1]);
            let min_lon = tiepoint[3] + (0.5 - tiepoint[0]) * scale_x;
            let max_lat = tiepoint[4] - (0.5 - tiepoint[1]) * scale_y;

            return Ok(GridHeader {
                rows,
                cols,
                bounds: TileBounds {
                    min_lat: max_lat - (rows - 1) as f64 * scale_y,
                    max_lat,
                    min_lon,
                    max_lon: min_lon + (cols - 1) as f64 * scale_x,
                },
            });
        }
    }

    // Fall back to the tile id in the file name
    let tile = tile_id_of(path)?;
    let nominal = |n: usize, border: usize| n.checked_sub(2 * border).filter(|&n| n >= 2);
    let (Some(nominal_cols), Some(nominal_rows)) = (
        nominal(cols, options.extra_border_lon),
        nominal(rows, options.extra_border_lat),
    ) else {
        return Err(DemError::Georeference(path.display().to_string()));
    };

    Ok(GridHeader {
        rows,
        cols,
        bounds: cell_bounds(
            tile,
            rows,
            cols,
            1.0 / (nominal_cols - 1) as f64,
            1.0 / (nominal_rows - 1) as f64,
            options,
        ),
    })
}

fn read_geotiff(path: &Path, options: &LoadOptions) -> Result<(GridHeader, Raster)> {
    let mut decoder = open_tiff(path)?;
    let header = tiff_header(&mut decoder, path, options)?;
    let no_data_value = read_nodata_value(&mut decoder);
    let data = decode_elevation_data(&mut decoder)?;

    let (rows, cols) = (header.rows, header.cols);
    if data.len() != rows * cols {
        return Err(DemError::file_format(
            path,
            format!("expected {} samples, decoded {}", rows * cols, data.len()),
        ));
    }

    // Flip to south-first rows
    let mut values = Vec::with_capacity(data.len());
    for row in data.chunks_exact(cols).rev() {
        values.extend_from_slice(row);
    }

    let mut raster = Raster::new(rows, cols, values)?;
    raster.mask_where(|v| v.is_nan() || v <= SRTM_VOID as f32);
    if let Some(nodata) = no_data_value {
        raster.mask_where(|v| (v - nodata).abs() < 0.001);
    }

    Ok((header, raster))
}

/// Decode elevation data from the TIFF decoder.
fn decode_elevation_data<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(_) | DecodingResult::I64(_) => Err(DemError::UnsupportedDataType(
            "64-bit integer samples".to_string(),
        )),
    }
}

/// GDAL_NODATA is stored as an ASCII string.
fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(geotiff_tag(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
}

// ============================================================================
// Helpers
// ============================================================================

/// Tag for a GeoTIFF code. The decoder keys known codes by their named
/// variant, never by `Tag::Unknown`.
fn geotiff_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn tile_id_of(path: &Path) -> Result<TileId> {
    path.file_name()
        .and_then(|s| s.to_str())
        .and_then(TileId::from_filename)
        .ok_or_else(|| DemError::Georeference(path.display().to_string()))
}

/// Bounds of a cell whose sample centers sit on the integer degrees,
/// widened by the extra border samples.
fn cell_bounds(
    tile: TileId,
    rows: usize,
    cols: usize,
    lon_increment: f64,
    lat_increment: f64,
    options: &LoadOptions,
) -> TileBounds {
    let min_lon = tile.lon as f64 - options.extra_border_lon as f64 * lon_increment;
    let min_lat = tile.lat as f64 - options.extra_border_lat as f64 * lat_increment;
    TileBounds {
        min_lat,
        max_lat: min_lat + (rows - 1) as f64 * lat_increment,
        min_lon,
        max_lon: min_lon + (cols - 1) as f64 * lon_increment,
    }
}
